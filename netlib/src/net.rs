//! Networking layer for the NetLib protocol.
//!
//! The connection loop uses `mio` for non-blocking I/O over either a UDP
//! socket (datagram variant) or a TCP stream (stream variant).

/// A transport socket bound to one protocol variant.
pub mod client;

/// Packet encoding and decoding for both wire variants.
pub mod codec;

/// The connection state machine and poll loop.
pub mod connection;

/// Codec and connection error types.
pub mod errors;

/// The protocol message type.
pub mod packet;

/// Wire variants and protocol version constants.
pub mod protocol_version;

/// Thread-safe FIFO of packets waiting to be sent.
pub mod queue;

/// Per-connection sequence numbers and acknowledgement window.
pub mod sequence;

/// Reassembly of stream frames.
pub mod utils;
