//! Wire variants of the NetLib protocol family.

use std::fmt;
use std::str::FromStr;

/// Highest packet version this engine understands.
pub const NETLIB_VERSION: u8 = 1;

/// Magic prefix of datagram packets.
pub const DATAGRAM_MAGIC: [u8; 3] = *b"NLP";

/// Magic prefix of stream packets.
pub const STREAM_MAGIC: [u8; 3] = *b"PKT";

/// Header length of the datagram variant.
///
/// magic(3) + version(1) + type(1) + flags(1) + localSeq(2) + remoteSeq(2)
/// + ackField(2) + recipients(4) + size(2)
pub const DATAGRAM_HEADER_LEN: usize = 18;

/// Header length of the stream variant.
///
/// magic(3) + version(1) + packed type/size(4) + recipients(4)
pub const STREAM_HEADER_LEN: usize = 12;

/// Largest payload the datagram size field can describe.
pub const DATAGRAM_MAX_PAYLOAD: usize = u16::MAX as usize;

/// Largest payload the 24-bit stream size field can describe.
pub const STREAM_MAX_PAYLOAD: usize = 0x00FF_FFFF;

/// The two incompatible wire formats of the protocol family.
///
/// A connection picks one at setup time from its transport mode and never
/// mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    /// Fixed 18-byte header with sequence numbers, carried over UDP.
    Datagram,
    /// Compact 12-byte header without sequencing, carried over TCP.
    Stream,
}

impl ProtocolVariant {
    pub fn magic(&self) -> [u8; 3] {
        match self {
            Self::Datagram => DATAGRAM_MAGIC,
            Self::Stream => STREAM_MAGIC,
        }
    }

    pub fn header_len(&self) -> usize {
        match self {
            Self::Datagram => DATAGRAM_HEADER_LEN,
            Self::Stream => STREAM_HEADER_LEN,
        }
    }

    pub fn max_payload(&self) -> usize {
        match self {
            Self::Datagram => DATAGRAM_MAX_PAYLOAD,
            Self::Stream => STREAM_MAX_PAYLOAD,
        }
    }

    /// Whether packets of this variant carry sequence numbers.
    pub fn is_sequenced(&self) -> bool {
        matches!(self, Self::Datagram)
    }
}

impl Default for ProtocolVariant {
    fn default() -> Self {
        Self::Datagram
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Datagram => "datagram",
            Self::Stream => "stream",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for ProtocolVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "datagram" | "udp" => Ok(Self::Datagram),
            "stream" | "tcp" => Ok(Self::Stream),
            other => Err(format!("unknown transport '{other}' (expected datagram or stream)")),
        }
    }
}
