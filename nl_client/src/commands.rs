use netlib::{Packet, PacketType};
use std::fmt;

/// Errors that can occur while parsing a packet input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line held no tokens.
    Empty,
    /// The first token is not a packet type id in `[0, 255]`.
    InvalidType(String),
    /// A payload token is not a byte in `[0, 255]`.
    InvalidByte(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty input. Enter a packet as '<type> <byte> <byte> ...'"),
            Self::InvalidType(value) => write!(
                f,
                "Invalid packet type '{}'. Must be an integer between 0 and 255 (e.g., '5 1 2 3')",
                value
            ),
            Self::InvalidByte(value) => write!(
                f,
                "Invalid payload byte '{}'. Each byte must be an integer between 0 and 255",
                value
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse one input line into a packet.
///
/// The first whitespace-separated token is the packet type id and every
/// following token is one payload byte. The packet is addressed to no
/// recipients and stamped with `version`.
///
/// # Examples
///
/// ```
/// use netlib::PacketType;
/// use nl_client::commands::parse_packet_line;
///
/// let packet = parse_packet_line("5 1 2 255", 1).unwrap();
/// assert_eq!(packet.kind, PacketType::PlayerReady);
/// assert_eq!(packet.payload, vec![1, 2, 255]);
/// assert_eq!(packet.recipients, 0);
///
/// assert!(parse_packet_line("5 256", 1).is_err());
/// ```
pub fn parse_packet_line(input: &str, version: u8) -> Result<Packet, ParseError> {
    let mut tokens = input.split_ascii_whitespace();
    let kind = tokens
        .next()
        .ok_or(ParseError::Empty)
        .and_then(parse_type)?;

    let payload = tokens
        .map(|token| {
            token
                .parse::<u8>()
                .map_err(|_| ParseError::InvalidByte(token.to_string()))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    Ok(Packet::new(kind, payload).with_version(version))
}

fn parse_type(token: &str) -> Result<PacketType, ParseError> {
    token
        .parse::<u8>()
        .map(PacketType::from)
        .map_err(|_| ParseError::InvalidType(token.to_string()))
}
