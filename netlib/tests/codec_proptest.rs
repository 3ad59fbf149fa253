/// Property-based tests for the codec and sequence tracker using proptest
///
/// These tests check the wire invariants across randomly generated
/// packets and sequence histories.
use netlib::{
    CodecError, Packet, PacketType, ProtocolVariant, SequenceTracker, codec,
    net::protocol_version::DATAGRAM_HEADER_LEN,
};
use proptest::prelude::*;

// Strategy to generate a packet with a payload of up to `max_len` bytes
fn packet_strategy(max_len: usize) -> impl Strategy<Value = Packet> {
    (
        any::<u8>(),
        any::<u32>(),
        any::<u8>(),
        prop::collection::vec(any::<u8>(), 0..=max_len),
    )
        .prop_map(|(kind, recipients, flags, payload)| {
            Packet::new(PacketType::from(kind), payload)
                .with_recipients(recipients)
                .with_flags(flags)
        })
}

proptest! {
    #[test]
    fn test_datagram_round_trip(packet in packet_strategy(2048)) {
        let mut sender = SequenceTracker::new();
        let mut receiver = SequenceTracker::new();
        let mut sent = packet.clone();
        let bytes = codec::encode_datagram(&mut sent, &mut sender).unwrap();
        prop_assert_eq!(bytes.len(), DATAGRAM_HEADER_LEN + packet.size());

        let decoded = codec::decode_datagram(&bytes, &mut receiver).unwrap();
        prop_assert_eq!(decoded.kind, packet.kind);
        prop_assert_eq!(decoded.recipients, packet.recipients);
        prop_assert_eq!(decoded.size(), packet.size());
        prop_assert_eq!(&decoded.payload, &packet.payload);
        prop_assert_eq!(decoded, sent);
    }

    #[test]
    fn test_stream_round_trip(packet in packet_strategy(2048)) {
        let decoded = codec::decode_stream(&codec::encode_stream(&packet).unwrap()).unwrap();
        prop_assert_eq!(decoded.kind, packet.kind);
        prop_assert_eq!(decoded.recipients, packet.recipients);
        prop_assert_eq!(&decoded.payload, &packet.payload);
    }

    #[test]
    fn test_truncated_datagram_is_malformed(packet in packet_strategy(64), cut in 1usize..=64) {
        let mut sequence = SequenceTracker::new();
        let mut packet = packet;
        let bytes = codec::encode_datagram(&mut packet, &mut sequence).unwrap();
        let len = bytes.len().saturating_sub(cut);
        let result = codec::decode_datagram(&bytes[..len], &mut sequence);
        let is_malformed = matches!(result, Err(CodecError::MalformedPacket { .. }));
        prop_assert!(is_malformed);
    }

    #[test]
    fn test_local_sequence_increments_by_one(start in any::<u16>(), sends in 1usize..200) {
        let mut sequence = SequenceTracker::starting_at(start);
        let mut previous = None;
        for _ in 0..sends {
            let mut packet = Packet::empty(PacketType::PlayerReady);
            codec::encode(ProtocolVariant::Datagram, &mut packet, &mut sequence).unwrap();
            if let Some(previous) = previous {
                prop_assert_eq!(packet.local_seq, u16::wrapping_add(previous, 1));
            } else {
                prop_assert_eq!(packet.local_seq, start);
            }
            previous = Some(packet.local_seq);
        }
    }

    #[test]
    fn test_high_water_mark_is_running_maximum(
        observed in prop::collection::vec(any::<u16>(), 1..100),
    ) {
        let mut sequence = SequenceTracker::new();
        let mut maximum = 0;
        for seq in observed {
            let before = sequence.remote_high_water_mark();
            sequence.observe_remote(seq);
            maximum = maximum.max(seq);
            prop_assert!(sequence.remote_high_water_mark() >= before);
            prop_assert_eq!(sequence.remote_high_water_mark(), maximum);
        }
    }
}

#[test]
fn test_datagram_round_trip_max_payload() {
    let mut sender = SequenceTracker::new();
    let mut receiver = SequenceTracker::new();
    let mut packet = Packet::new(PacketType::PlayerInfo, vec![0x5A; u16::MAX as usize]);
    let bytes = codec::encode_datagram(&mut packet, &mut sender).unwrap();
    let decoded = codec::decode_datagram(&bytes, &mut receiver).unwrap();
    assert_eq!(decoded.size(), u16::MAX as usize);
    assert_eq!(decoded, packet);
}
