//! # NetLib
//!
//! Client-side engine for NetLib, a small binary protocol used to exchange
//! framed messages with a game server over either a datagram (UDP) or a
//! stream (TCP) transport.
//!
//! ## Architecture
//!
//! The engine is built from four pieces, leaves first:
//!
//! - **Codec** ([`net::codec`]): encodes and decodes a [`Packet`] to and from
//!   one of the two wire variants.
//! - **Sequence tracking** ([`net::sequence`]): local/remote sequence numbers
//!   and the acknowledgement window of one connection.
//! - **Outbound queue** ([`net::queue`]): a thread-safe FIFO that lets an
//!   input-producing thread hand packets to the network loop.
//! - **Connection loop** ([`net::connection`]): the `Connecting → Connected →
//!   Disconnected` state machine that drains the queue, waits on socket
//!   readiness and dispatches inbound packets.
//!
//! ## Example
//!
//! ```
//! use netlib::{Packet, PacketType, ProtocolVariant, SequenceTracker, codec};
//!
//! let mut sequence = SequenceTracker::new();
//! let mut packet = Packet::new(PacketType::ClientConnect, Vec::new());
//! let bytes = codec::encode(ProtocolVariant::Datagram, &mut packet, &mut sequence).unwrap();
//! assert_eq!(bytes.len(), 18);
//! assert_eq!(sequence.peek_local(), 1);
//! ```

/// Networking components: codec, sequencing, queueing and the connection loop.
pub mod net;
pub use net::{
    client::{Connection, Received},
    codec,
    connection::{Assignment, ConnectionConfig, ConnectionLoop, ConnectionState, StopHandle},
    errors::{CodecError, ConnectionError},
    packet::{self, Packet, PacketType},
    protocol_version::{NETLIB_VERSION, ProtocolVariant},
    queue::OutboundQueue,
    sequence::SequenceTracker,
};
