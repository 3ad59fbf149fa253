//! Wire encoding for NetLib packets.
//!
//! All multi-byte integers are big-endian.
//!
//! Datagram variant (18-byte header):
//!
//! ```text
//! magic "NLP" (3) | version (1) | type (1) | flags (1)
//! | localSeq (2) | remoteSeq (2) | ackField (2) | recipients (4) | size (2)
//! | payload (size)
//! ```
//!
//! Stream variant (12-byte header):
//!
//! ```text
//! magic "PKT" (3) | version (1) | type << 24 | size (4) | recipients (4)
//! | payload (size)
//! ```
//!
//! Datagram encoding and decoding go through the connection's
//! [`SequenceTracker`]: encoding stamps the packet with the tracker's
//! sequence state and advances the local counter, decoding feeds the
//! header's remote sequence number into the high-water mark.

use super::{
    errors::CodecError,
    packet::{Packet, PacketType},
    protocol_version::{
        DATAGRAM_HEADER_LEN, NETLIB_VERSION, ProtocolVariant, STREAM_HEADER_LEN,
        STREAM_MAX_PAYLOAD,
    },
    sequence::SequenceTracker,
};

/// Encode `packet` in the given variant.
///
/// For the datagram variant the packet's sequence fields are overwritten
/// with the tracker's state first; the stream variant leaves the tracker
/// untouched.
pub fn encode(
    variant: ProtocolVariant,
    packet: &mut Packet,
    sequence: &mut SequenceTracker,
) -> Result<Vec<u8>, CodecError> {
    match variant {
        ProtocolVariant::Datagram => encode_datagram(packet, sequence),
        ProtocolVariant::Stream => encode_stream(packet),
    }
}

/// Decode one complete packet of the given variant from `buf`.
pub fn decode(
    variant: ProtocolVariant,
    buf: &[u8],
    sequence: &mut SequenceTracker,
) -> Result<Packet, CodecError> {
    match variant {
        ProtocolVariant::Datagram => decode_datagram(buf, sequence),
        ProtocolVariant::Stream => decode_stream(buf),
    }
}

pub fn encode_datagram(
    packet: &mut Packet,
    sequence: &mut SequenceTracker,
) -> Result<Vec<u8>, CodecError> {
    check_payload(ProtocolVariant::Datagram, packet)?;

    packet.local_seq = sequence.next_local();
    packet.remote_seq = sequence.remote_high_water_mark();
    packet.ack_field = sequence.ack_field();

    let mut buf = Vec::with_capacity(DATAGRAM_HEADER_LEN + packet.size());
    buf.extend_from_slice(&ProtocolVariant::Datagram.magic());
    buf.push(packet.version);
    buf.push(packet.kind.id());
    buf.push(packet.flags);
    buf.extend_from_slice(&packet.local_seq.to_be_bytes());
    buf.extend_from_slice(&packet.remote_seq.to_be_bytes());
    buf.extend_from_slice(&packet.ack_field.to_be_bytes());
    buf.extend_from_slice(&packet.recipients.to_be_bytes());
    buf.extend_from_slice(&(packet.size() as u16).to_be_bytes());
    buf.extend_from_slice(&packet.payload);
    Ok(buf)
}

pub fn decode_datagram(buf: &[u8], sequence: &mut SequenceTracker) -> Result<Packet, CodecError> {
    check_header(ProtocolVariant::Datagram, buf)?;

    let kind = PacketType::from(buf[4]);
    let flags = buf[5];
    let local_seq = u16::from_be_bytes([buf[6], buf[7]]);
    let remote_seq = u16::from_be_bytes([buf[8], buf[9]]);
    let ack_field = u16::from_be_bytes([buf[10], buf[11]]);
    let recipients = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);
    let size = u16::from_be_bytes([buf[16], buf[17]]) as usize;
    let payload = read_payload(buf, DATAGRAM_HEADER_LEN, size)?;

    sequence.observe_remote(remote_seq);

    Ok(Packet {
        version: buf[3],
        kind,
        recipients,
        payload,
        flags,
        local_seq,
        remote_seq,
        ack_field,
    })
}

pub fn encode_stream(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    check_payload(ProtocolVariant::Stream, packet)?;

    let packed =
        (u32::from(packet.kind.id()) << 24) | (packet.size() as u32 & STREAM_MAX_PAYLOAD as u32);
    let mut buf = Vec::with_capacity(STREAM_HEADER_LEN + packet.size());
    buf.extend_from_slice(&ProtocolVariant::Stream.magic());
    buf.push(packet.version);
    buf.extend_from_slice(&packed.to_be_bytes());
    buf.extend_from_slice(&packet.recipients.to_be_bytes());
    buf.extend_from_slice(&packet.payload);
    Ok(buf)
}

pub fn decode_stream(buf: &[u8]) -> Result<Packet, CodecError> {
    check_header(ProtocolVariant::Stream, buf)?;

    let packed = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let recipients = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let size = (packed & STREAM_MAX_PAYLOAD as u32) as usize;
    let payload = read_payload(buf, STREAM_HEADER_LEN, size)?;

    let kind = PacketType::from((packed >> 24) as u8);
    Ok(Packet::new(kind, payload)
        .with_version(buf[3])
        .with_recipients(recipients))
}

/// Total length of the stream frame at the start of `buf`, or `None` while
/// the header is still incomplete.
pub fn stream_frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < STREAM_HEADER_LEN {
        return None;
    }
    let packed = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    Some(STREAM_HEADER_LEN + (packed & STREAM_MAX_PAYLOAD as u32) as usize)
}

fn check_payload(variant: ProtocolVariant, packet: &Packet) -> Result<(), CodecError> {
    if packet.size() > variant.max_payload() {
        return Err(CodecError::PayloadTooLarge {
            size: packet.size(),
            max: variant.max_payload(),
        });
    }
    Ok(())
}

fn check_header(variant: ProtocolVariant, buf: &[u8]) -> Result<(), CodecError> {
    if buf.len() < variant.header_len() {
        return Err(CodecError::MalformedPacket {
            needed: variant.header_len(),
            available: buf.len(),
        });
    }

    let expected = variant.magic();
    let found = [buf[0], buf[1], buf[2]];
    if found != expected {
        return Err(CodecError::BadMagic { found, expected });
    }

    if buf[3] > NETLIB_VERSION {
        return Err(CodecError::UnsupportedVersion {
            version: buf[3],
            supported: NETLIB_VERSION,
        });
    }
    Ok(())
}

fn read_payload(buf: &[u8], offset: usize, size: usize) -> Result<Vec<u8>, CodecError> {
    let end = offset + size;
    match buf.get(offset..end) {
        Some(payload) => Ok(payload.to_vec()),
        None => Err(CodecError::MalformedPacket {
            needed: end,
            available: buf.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::packet::{FLAG_EXPLICITACK, FLAG_UNRELIABLE};

    #[test]
    fn test_encode_client_connect_datagram() {
        let mut sequence = SequenceTracker::new();
        let mut packet = Packet::empty(PacketType::ClientConnect);
        let bytes = encode_datagram(&mut packet, &mut sequence).unwrap();
        assert_eq!(
            bytes,
            vec![
                b'N', b'L', b'P', // magic
                0x01, 0x01, 0x00, // version, type, flags
                0x00, 0x00, // localSeq
                0x00, 0x00, // remoteSeq
                0xFF, 0xFF, // ackField
                0x00, 0x00, 0x00, 0x00, // recipients
                0x00, 0x00, // size
            ]
        );
    }

    #[test]
    fn test_encode_datagram_stamps_and_advances_sequence() {
        let mut sequence = SequenceTracker::new();
        sequence.observe_remote(7);

        let mut first = Packet::empty(PacketType::Ackbeat);
        let mut second = Packet::empty(PacketType::Ackbeat);
        encode_datagram(&mut first, &mut sequence).unwrap();
        let bytes = encode_datagram(&mut second, &mut sequence).unwrap();

        assert_eq!(first.local_seq, 0);
        assert_eq!(second.local_seq, 1);
        assert_eq!(second.remote_seq, 7);
        assert_eq!(&bytes[6..10], &[0x00, 0x01, 0x00, 0x07]);
        assert_eq!(sequence.peek_local(), 2);
    }

    #[test]
    fn test_encode_datagram_layout_with_payload() {
        let mut sequence = SequenceTracker::new();
        let mut packet = Packet::new(PacketType::PlayerReady, vec![0xDE, 0xAD])
            .with_recipients(0x0102_0304)
            .with_flags(FLAG_EXPLICITACK);
        let bytes = encode_datagram(&mut packet, &mut sequence).unwrap();
        assert_eq!(bytes.len(), DATAGRAM_HEADER_LEN + 2);
        assert_eq!(bytes[4], 5);
        assert_eq!(bytes[5], FLAG_EXPLICITACK);
        assert_eq!(&bytes[12..16], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[16..18], &[0x00, 0x02]);
        assert_eq!(&bytes[18..], &[0xDE, 0xAD]);
    }

    #[test]
    fn test_datagram_round_trip() {
        let mut sender = SequenceTracker::new();
        let mut receiver = SequenceTracker::new();
        let mut packet = Packet::new(PacketType::Other(200), vec![9; 300])
            .with_recipients(0b1010)
            .with_flags(FLAG_UNRELIABLE);
        let bytes = encode_datagram(&mut packet, &mut sender).unwrap();
        let decoded = decode_datagram(&bytes, &mut receiver).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_decode_datagram_updates_high_water_mark() {
        let mut sender = SequenceTracker::new();
        sender.observe_remote(12);
        let mut packet = Packet::empty(PacketType::Ackbeat);
        let bytes = encode_datagram(&mut packet, &mut sender).unwrap();

        let mut receiver = SequenceTracker::new();
        receiver.observe_remote(20);
        decode_datagram(&bytes, &mut receiver).unwrap();
        assert_eq!(receiver.remote_high_water_mark(), 20);

        let mut fresh = SequenceTracker::new();
        decode_datagram(&bytes, &mut fresh).unwrap();
        assert_eq!(fresh.remote_high_water_mark(), 12);
    }

    #[test]
    fn test_decode_datagram_short_header() {
        let mut sequence = SequenceTracker::new();
        let result = decode_datagram(b"NLP\x01\x01", &mut sequence);
        assert_eq!(
            result,
            Err(CodecError::MalformedPacket {
                needed: DATAGRAM_HEADER_LEN,
                available: 5
            })
        );
    }

    #[test]
    fn test_decode_datagram_truncated_payload() {
        let mut sequence = SequenceTracker::new();
        let mut packet = Packet::new(PacketType::PlayerInfo, vec![1, 2, 3, 4]);
        let bytes = encode_datagram(&mut packet, &mut sequence).unwrap();

        let mut receiver = SequenceTracker::new();
        let result = decode_datagram(&bytes[..bytes.len() - 1], &mut receiver);
        assert_eq!(
            result,
            Err(CodecError::MalformedPacket {
                needed: DATAGRAM_HEADER_LEN + 4,
                available: DATAGRAM_HEADER_LEN + 3
            })
        );
        // A rejected packet leaves the tracker alone.
        assert_eq!(receiver, SequenceTracker::new());
    }

    #[test]
    fn test_decode_datagram_bad_magic() {
        let mut sequence = SequenceTracker::new();
        let mut bytes = vec![0u8; DATAGRAM_HEADER_LEN];
        bytes[..3].copy_from_slice(b"PKT");
        assert!(matches!(
            decode_datagram(&bytes, &mut sequence),
            Err(CodecError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_decode_datagram_newer_version() {
        let mut sequence = SequenceTracker::new();
        let mut packet = Packet::empty(PacketType::Ackbeat).with_version(NETLIB_VERSION + 1);
        let bytes = encode_datagram(&mut packet, &mut sequence).unwrap();
        assert_eq!(
            decode_datagram(&bytes, &mut sequence),
            Err(CodecError::UnsupportedVersion {
                version: NETLIB_VERSION + 1,
                supported: NETLIB_VERSION
            })
        );
    }

    #[test]
    fn test_encode_datagram_payload_too_large() {
        let mut sequence = SequenceTracker::new();
        let mut packet = Packet::new(PacketType::PlayerInfo, vec![0; 65_536]);
        assert!(matches!(
            encode_datagram(&mut packet, &mut sequence),
            Err(CodecError::PayloadTooLarge { size: 65_536, .. })
        ));
        // A rejected packet does not consume a sequence number.
        assert_eq!(sequence.peek_local(), 0);
    }

    #[test]
    fn test_encode_stream_layout() {
        let packet = Packet::new(PacketType::PlayerInfo, vec![0x07]).with_recipients(0b11);
        let bytes = encode_stream(&packet).unwrap();
        assert_eq!(
            bytes,
            vec![
                b'P', b'K', b'T', 0x01, // magic, version
                0x02, 0x00, 0x00, 0x01, // type 2, size 1
                0x00, 0x00, 0x00, 0x03, // recipients
                0x07, // payload
            ]
        );
    }

    #[test]
    fn test_stream_round_trip() {
        let packet =
            Packet::new(PacketType::PlayerDisconnect, vec![1; 70_000]).with_recipients(u32::MAX);
        let decoded = decode_stream(&encode_stream(&packet).unwrap()).unwrap();
        assert_eq!(decoded.kind, packet.kind);
        assert_eq!(decoded.recipients, packet.recipients);
        assert_eq!(decoded.payload, packet.payload);
    }

    #[test]
    fn test_stream_ignores_sequence_fields() {
        let mut sequence = SequenceTracker::new();
        let mut packet = Packet::empty(PacketType::Ackbeat).with_flags(FLAG_UNRELIABLE);
        let bytes = encode(ProtocolVariant::Stream, &mut packet, &mut sequence).unwrap();
        assert_eq!(bytes.len(), STREAM_HEADER_LEN);
        assert_eq!(sequence.peek_local(), 0);

        let decoded = decode(ProtocolVariant::Stream, &bytes, &mut sequence).unwrap();
        assert_eq!(decoded.flags, 0);
    }

    #[test]
    fn test_decode_stream_truncated() {
        let packet = Packet::new(PacketType::PlayerInfo, vec![1, 2]);
        let bytes = encode_stream(&packet).unwrap();
        assert!(matches!(
            decode_stream(&bytes[..STREAM_HEADER_LEN - 1]),
            Err(CodecError::MalformedPacket { .. })
        ));
        assert!(matches!(
            decode_stream(&bytes[..STREAM_HEADER_LEN + 1]),
            Err(CodecError::MalformedPacket { needed: 14, available: 13 })
        ));
    }

    #[test]
    fn test_stream_frame_len() {
        let packet = Packet::new(PacketType::PlayerInfo, vec![0; 10]);
        let bytes = encode_stream(&packet).unwrap();
        assert_eq!(stream_frame_len(&bytes[..4]), None);
        assert_eq!(stream_frame_len(&bytes[..STREAM_HEADER_LEN]), Some(22));
        assert_eq!(stream_frame_len(&bytes), Some(22));
    }

    #[test]
    fn test_variants_are_not_mixed() {
        let mut sequence = SequenceTracker::new();
        let mut packet = Packet::new(PacketType::PlayerInfo, vec![1; 20]);
        let datagram = encode(ProtocolVariant::Datagram, &mut packet, &mut sequence).unwrap();
        assert!(matches!(
            decode(ProtocolVariant::Stream, &datagram, &mut sequence),
            Err(CodecError::BadMagic { .. })
        ));
    }
}
