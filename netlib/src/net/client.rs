//! A non-blocking NetLib transport.
//!
//! A [`Connection`] owns one socket, the wire variant that socket speaks and
//! the connection's [`SequenceTracker`]. It never blocks: receives report
//! [`Received::WouldBlock`] instead of waiting, and stream writes that cannot
//! complete are buffered until the socket drains.

use std::{
    io::{self, Write},
    net::{self, IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    thread,
    time::Duration,
};

use log::{debug, trace};
use mio::{
    Interest, Registry, Token,
    net::{TcpStream, UdpSocket},
};

use super::{
    codec,
    errors::{CodecError, ConnectionError},
    packet::Packet,
    protocol_version::{DATAGRAM_MAX_PAYLOAD, ProtocolVariant},
    sequence::SequenceTracker,
    utils::{Fill, FrameBuffer},
};

/// Timeouts for successive stream connect attempts, tried last to first.
const CONNECT_TIMEOUTS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_millis(500),
    Duration::from_millis(100),
];

/// Result of one non-blocking receive attempt.
#[derive(Debug)]
pub enum Received {
    /// A complete, valid packet.
    Delivered(Packet),
    /// Nothing is available right now.
    WouldBlock,
    /// Bytes arrived but did not decode as a packet.
    Rejected(CodecError),
    /// The socket reported an error. The connection stays usable.
    TransportError(String),
    /// The peer closed the stream. Never returned for datagrams.
    Closed,
}

enum Transport {
    Datagram {
        socket: UdpSocket,
        buf: Vec<u8>,
    },
    Stream {
        stream: TcpStream,
        inbound: FrameBuffer,
        outbound: Vec<u8>,
        eof: bool,
    },
}

/// A socket speaking one NetLib wire variant to one server.
pub struct Connection {
    server: SocketAddr,
    variant: ProtocolVariant,
    transport: Transport,
    sequence: SequenceTracker,
}

impl Connection {
    /// Open a transport to `server` for the given variant.
    ///
    /// The datagram variant binds an ephemeral local port and connects the
    /// socket to the server so only its datagrams are received. The stream
    /// variant opens a TCP connection, retrying with increasing timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or the server cannot
    /// be reached.
    pub fn open(server: SocketAddr, variant: ProtocolVariant) -> io::Result<Self> {
        let transport = match variant {
            ProtocolVariant::Datagram => {
                let socket = UdpSocket::bind(unspecified_for(&server))?;
                socket.connect(server)?;
                Transport::Datagram {
                    socket,
                    buf: vec![0; datagram_capacity()],
                }
            }
            ProtocolVariant::Stream => Transport::Stream {
                stream: connect_stream(&server)?,
                inbound: FrameBuffer::new(),
                outbound: Vec::new(),
                eof: false,
            },
        };
        debug!("opened {variant} transport to {server}");
        Ok(Self {
            server,
            variant,
            transport,
            sequence: SequenceTracker::new(),
        })
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match &self.transport {
            Transport::Datagram { socket, .. } => socket.local_addr(),
            Transport::Stream { stream, .. } => stream.local_addr(),
        }
    }

    /// Encode and send one packet.
    ///
    /// For datagrams this stamps the packet's sequence fields and advances
    /// the local counter. For streams the bytes are queued behind anything
    /// still unsent and written as far as the socket allows.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet cannot be encoded or the socket
    /// rejects the write.
    pub fn send_packet(&mut self, packet: &mut Packet) -> Result<(), ConnectionError> {
        let bytes = codec::encode(self.variant, packet, &mut self.sequence)?;
        match &mut self.transport {
            Transport::Datagram { socket, .. } => {
                socket.send(&bytes)?;
            }
            Transport::Stream { outbound, .. } => outbound.extend_from_slice(&bytes),
        }
        self.flush()?;
        trace!("sent {} bytes to {}", bytes.len(), self.server);
        Ok(())
    }

    /// Write as much buffered stream data as the socket accepts.
    ///
    /// # Errors
    ///
    /// Returns any write error other than would-block.
    pub fn flush(&mut self) -> io::Result<()> {
        let Transport::Stream {
            stream, outbound, ..
        } = &mut self.transport
        else {
            return Ok(());
        };
        while !outbound.is_empty() {
            match stream.write(outbound) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    outbound.drain(..n);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    /// Attempt one non-blocking receive.
    pub fn recv(&mut self) -> Received {
        match &mut self.transport {
            Transport::Datagram { socket, buf } => loop {
                match socket.recv(buf) {
                    Ok(n) => {
                        return match codec::decode_datagram(&buf[..n], &mut self.sequence) {
                            Ok(packet) => Received::Delivered(packet),
                            Err(error) => Received::Rejected(error),
                        };
                    }
                    Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                        return Received::WouldBlock;
                    }
                    Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                    Err(error) => return Received::TransportError(error.to_string()),
                }
            },
            Transport::Stream {
                stream,
                inbound,
                eof,
                ..
            } => {
                let frame = match inbound.next_frame() {
                    Some(frame) => Some(frame),
                    None if *eof => None,
                    None => {
                        match inbound.fill_from(stream) {
                            Ok(Fill::WouldBlock) => {}
                            Ok(Fill::Eof) => *eof = true,
                            Err(error) => return Received::TransportError(error.to_string()),
                        }
                        inbound.next_frame()
                    }
                };
                match frame {
                    Some(frame) => match codec::decode_stream(&frame) {
                        Ok(packet) => Received::Delivered(packet),
                        Err(error) => Received::Rejected(error),
                    },
                    None if *eof => Received::Closed,
                    None => Received::WouldBlock,
                }
            }
        }
    }

    pub(crate) fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        match &mut self.transport {
            Transport::Datagram { socket, .. } => {
                registry.register(socket, token, Interest::READABLE)
            }
            Transport::Stream { stream, .. } => {
                registry.register(stream, token, Interest::READABLE | Interest::WRITABLE)
            }
        }
    }
}

fn datagram_capacity() -> usize {
    ProtocolVariant::Datagram.header_len() + DATAGRAM_MAX_PAYLOAD
}

fn unspecified_for(server: &SocketAddr) -> SocketAddr {
    let ip = match server.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}

fn connect_stream(server: &SocketAddr) -> io::Result<TcpStream> {
    let mut connect_timeouts = CONNECT_TIMEOUTS.to_vec();
    let mut last_error = io::Error::from(io::ErrorKind::TimedOut);
    while let Some(connect_timeout) = connect_timeouts.pop() {
        match net::TcpStream::connect_timeout(server, connect_timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                stream.set_nonblocking(true)?;
                return Ok(TcpStream::from_std(stream));
            }
            Err(error) => {
                debug!("connect to {server} failed: {error}");
                last_error = error;
                thread::sleep(connect_timeout);
            }
        }
    }
    Err(last_error)
}
