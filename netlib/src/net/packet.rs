use std::fmt;

use super::protocol_version::NETLIB_VERSION;

/// The packet is fire-and-forget and should not be tracked for acks.
pub const FLAG_UNRELIABLE: u8 = 0x01;

/// The sender wants an immediate `Ackbeat` in response.
pub const FLAG_EXPLICITACK: u8 = 0x02;

/// Ack field stamped on packets that have not been through a sequence
/// tracker yet.
pub const DEFAULT_ACK_FIELD: u16 = 0xFFFF;

/// Kind of a NetLib packet.
///
/// The ids follow the revision where the liveness probe is called
/// `Ackbeat` and has id 0. Ids outside the known range are game-defined
/// and carried through untouched as [`PacketType::Other`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PacketType {
    /// Liveness probe. Must be echoed back as soon as it arrives.
    Ackbeat,
    /// First packet a client sends, with an empty payload.
    ClientConnect,
    /// Player slot information; the first payload byte is a player number.
    PlayerInfo,
    PlayerDisconnect,
    /// Connect refusal.
    ServerFull,
    PlayerReady,
    Other(u8),
}

impl PacketType {
    pub fn id(&self) -> u8 {
        match self {
            Self::Ackbeat => 0,
            Self::ClientConnect => 1,
            Self::PlayerInfo => 2,
            Self::PlayerDisconnect => 3,
            Self::ServerFull => 4,
            Self::PlayerReady => 5,
            Self::Other(id) => *id,
        }
    }

    pub fn is_liveness_probe(&self) -> bool {
        matches!(self, Self::Ackbeat)
    }
}

impl From<u8> for PacketType {
    fn from(id: u8) -> Self {
        match id {
            0 => Self::Ackbeat,
            1 => Self::ClientConnect,
            2 => Self::PlayerInfo,
            3 => Self::PlayerDisconnect,
            4 => Self::ServerFull,
            5 => Self::PlayerReady,
            id => Self::Other(id),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(kind: PacketType) -> Self {
        kind.id()
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ackbeat => "Ackbeat",
            Self::ClientConnect => "ClientConnect",
            Self::PlayerInfo => "PlayerInfo",
            Self::PlayerDisconnect => "PlayerDisconnect",
            Self::ServerFull => "ServerFull",
            Self::PlayerReady => "PlayerReady",
            Self::Other(id) => return write!(f, "{id}"),
        };
        write!(f, "{} ({name})", self.id())
    }
}

/// A single NetLib protocol message.
///
/// The size on the wire is always derived from the payload, so the two can
/// never disagree. `flags` and the sequence fields only exist in the
/// datagram variant; the stream variant ignores them when encoding and
/// leaves them at their defaults when decoding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    pub version: u8,
    pub kind: PacketType,
    /// Bit `n - 1` targets player `n`. Advisory only.
    pub recipients: u32,
    pub payload: Vec<u8>,
    pub flags: u8,
    pub local_seq: u16,
    pub remote_seq: u16,
    pub ack_field: u16,
}

impl Packet {
    /// Create a packet of the current version addressed to nobody.
    pub fn new(kind: PacketType, payload: Vec<u8>) -> Self {
        Self {
            version: NETLIB_VERSION,
            kind,
            recipients: 0,
            payload,
            flags: 0,
            local_seq: 0,
            remote_seq: 0,
            ack_field: DEFAULT_ACK_FIELD,
        }
    }

    /// A zero-payload packet of the given kind.
    pub fn empty(kind: PacketType) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_recipients(mut self, recipients: u32) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Number of payload bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Add player `player` (1-based) to the recipients mask. Player numbers
    /// outside `1..=32` are ignored.
    pub fn add_recipient(&mut self, player: u8) {
        if (1..=32).contains(&player) {
            self.recipients |= 1 << (player - 1);
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "NetLib Packet")?;
        writeln!(f, "    Version: {}", self.version)?;
        writeln!(f, "    Type: {}", self.kind)?;
        writeln!(f, "    Recipients: {:032b}", self.recipients)?;
        writeln!(f, "    SeqNum: {}", self.local_seq)?;
        writeln!(f, "    RemoteNum: {}", self.remote_seq)?;
        write!(f, "    AckField: {:016b}", self.ack_field)?;
        if !self.payload.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Data: ")?;
            write!(f, "    ")?;
            for byte in &self.payload {
                write!(f, "{byte:02x}")?;
            }
        }
        Ok(())
    }
}
