//! Network error types for codec and connection operations.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while encoding or decoding a packet.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes were available than the header or size field requires.
    #[error("malformed packet: needed {needed} bytes, only {available} available")]
    MalformedPacket { needed: usize, available: usize },

    /// The packet did not start with the variant's magic bytes.
    #[error("bad magic {found:?}, expected {expected:?}")]
    BadMagic { found: [u8; 3], expected: [u8; 3] },

    /// The packet version is newer than this engine supports.
    #[error("unsupported packet version {version} (supported up to {supported})")]
    UnsupportedVersion { version: u8, supported: u8 },

    /// The payload does not fit in the variant's size field.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Errors that end a connection or prevent one from being established.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The server answered the connect request with `ServerFull`.
    #[error("server is full")]
    ServerFull,

    /// No assignment arrived within the configured handshake timeout.
    #[error("no connection assignment within {0:?}")]
    HandshakeTimeout(Duration),

    /// The peer closed the stream before the handshake completed.
    #[error("disconnected by peer")]
    Disconnected,
}

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let error = CodecError::MalformedPacket {
            needed: 18,
            available: 4,
        };
        assert_eq!(
            error.to_string(),
            "malformed packet: needed 18 bytes, only 4 available"
        );
    }

    #[test]
    fn test_codec_error_converts_into_connection_error() {
        let error: ConnectionError = CodecError::PayloadTooLarge {
            size: 70_000,
            max: 65_535,
        }
        .into();
        assert!(matches!(
            error,
            ConnectionError::Codec(CodecError::PayloadTooLarge { .. })
        ));
        assert_eq!(error.to_string(), "payload size 70000 exceeds maximum 65535");
    }

    #[test]
    fn test_io_error_converts_into_connection_error() {
        let error: ConnectionError =
            std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into();
        assert!(matches!(error, ConnectionError::Io(_)));
    }
}
