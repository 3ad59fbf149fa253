use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use netlib::{
    OutboundQueue, Packet, PacketType, SequenceTracker, codec, net::utils::FrameBuffer,
};
use rand::Rng;
use std::hint::black_box;

/// Helper to build a packet with `len` random payload bytes
fn packet_with_payload(len: usize) -> Packet {
    let mut rng = rand::rng();
    let payload = (0..len).map(|_| rng.random()).collect();
    Packet::new(PacketType::PlayerInfo, payload).with_recipients(0b1011)
}

/// Benchmark datagram encoding for a range of payload sizes
fn bench_encode_datagram(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_datagram");

    for len in [0, 64, 1024, 16384] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let packet = packet_with_payload(len);
            let mut sequence = SequenceTracker::new();
            b.iter(|| {
                let mut packet = packet.clone();
                black_box(codec::encode_datagram(&mut packet, &mut sequence).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark datagram decoding, including sequence bookkeeping
fn bench_decode_datagram(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_datagram");

    for len in [0, 64, 1024, 16384] {
        let mut packet = packet_with_payload(len);
        let bytes = codec::encode_datagram(&mut packet, &mut SequenceTracker::new()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(len), &bytes, |b, bytes| {
            let mut sequence = SequenceTracker::new();
            b.iter(|| black_box(codec::decode_datagram(bytes, &mut sequence).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark stream frame reassembly from small split reads
fn bench_stream_reassembly(c: &mut Criterion) {
    let frames: Vec<u8> = (0..32)
        .flat_map(|i| codec::encode_stream(&packet_with_payload(i * 8)).unwrap())
        .collect();

    c.bench_function("stream_reassembly_32_frames", |b| {
        b.iter(|| {
            let mut buffer = FrameBuffer::new();
            let mut count = 0;
            for chunk in frames.chunks(37) {
                buffer.extend(chunk);
                while let Some(frame) = buffer.next_frame() {
                    black_box(codec::decode_stream(&frame).unwrap());
                    count += 1;
                }
            }
            assert_eq!(count, 32);
        });
    });
}

/// Benchmark pushing and draining the outbound queue
fn bench_queue_push_drain(c: &mut Criterion) {
    let queue = OutboundQueue::new();
    let packet = packet_with_payload(16);

    c.bench_function("queue_push_drain_100", |b| {
        b.iter(|| {
            for _ in 0..100 {
                queue.push(packet.clone());
            }
            black_box(queue.drain_all())
        });
    });
}

criterion_group!(
    codec_operations,
    bench_encode_datagram,
    bench_decode_datagram,
    bench_stream_reassembly,
);

criterion_group!(queue_operations, bench_queue_push_drain);

criterion_main!(codec_operations, queue_operations);
