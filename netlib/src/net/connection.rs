//! The NetLib connection state machine.
//!
//! A [`ConnectionLoop`] moves through three states:
//!
//! - **Connecting**: a `ClientConnect` packet is sent and the loop waits for
//!   the server to assign a player slot (`PlayerInfo`) or refuse (`ServerFull`).
//! - **Connected**: each cycle sends everything queued in the
//!   [`OutboundQueue`], receives until the socket would block, then waits on
//!   socket readiness for at most the poll interval. Liveness probes are
//!   echoed immediately; every other packet goes to the caller's handler.
//! - **Disconnected**: terminal. Reached on stream end-of-input or when a
//!   [`StopHandle`] is triggered.
//!
//! Packets queued before a cycle starts are always sent before that cycle's
//! receive attempt, in the order they were pushed.

use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use mio::{Events, Poll, Token, Waker};

use super::{
    client::{Connection, Received},
    errors::{ConnectionError, Result},
    packet::{FLAG_EXPLICITACK, FLAG_UNRELIABLE, Packet, PacketType},
    protocol_version::{NETLIB_VERSION, ProtocolVariant},
    queue::OutboundQueue,
};

const SOCKET: Token = Token(0);
const WAKER: Token = Token(1);

/// Default upper bound on one readiness wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Receives handled per cycle before queued sends get another turn.
const MAX_RECEIVES_PER_CYCLE: usize = 64;

/// Settings for one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub server: SocketAddr,
    /// Wire variant, which also selects the transport.
    pub variant: ProtocolVariant,
    /// Longest time a cycle waits for readiness before looking at the
    /// queue again.
    pub poll_interval: Duration,
    /// How long to wait for the connection assignment. `None` waits
    /// indefinitely.
    pub handshake_timeout: Option<Duration>,
    /// Version stamped on packets the loop generates itself.
    pub version: u8,
}

impl ConnectionConfig {
    pub fn new(server: SocketAddr, variant: ProtocolVariant) -> Self {
        Self {
            server,
            variant,
            poll_interval: DEFAULT_POLL_INTERVAL,
            handshake_timeout: None,
            version: NETLIB_VERSION,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// The slot the server assigned during the handshake.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Assignment {
    /// 1-based player number, if the server sent one.
    pub player: Option<u8>,
}

impl Assignment {
    /// Recipients bitmask addressing the assigned player.
    pub fn recipients(&self) -> u32 {
        match self.player {
            Some(player @ 1..=32) => 1 << (player - 1),
            _ => 0,
        }
    }
}

/// Stops a [`ConnectionLoop`] from any thread.
#[derive(Clone, Debug)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl StopHandle {
    /// Ask the loop to disconnect. It notices within one cycle.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Err(error) = self.waker.wake() {
            warn!("failed to wake connection loop: {error}");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Drives one NetLib connection.
///
/// The loop owns the socket and its sequence state; only the
/// [`OutboundQueue`] and the [`StopHandle`] are shared with other threads.
pub struct ConnectionLoop {
    config: ConnectionConfig,
    connection: Connection,
    poll: Poll,
    events: Events,
    queue: OutboundQueue,
    state: ConnectionState,
    assignment: Option<Assignment>,
    stop: StopHandle,
}

impl ConnectionLoop {
    /// Open the transport and complete the handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened, the server
    /// refuses the connection, the stream closes, or the handshake times out.
    pub fn connect(config: ConnectionConfig, queue: OutboundQueue) -> Result<Self> {
        let mut connection_loop = Self::open(config, queue)?;
        connection_loop.handshake()?;
        Ok(connection_loop)
    }

    /// Open the transport without starting the handshake.
    ///
    /// The loop starts in [`ConnectionState::Connecting`]; call
    /// [`Self::handshake`] next. This lets a caller grab a [`StopHandle`]
    /// before blocking on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport or the poller cannot be created.
    pub fn open(config: ConnectionConfig, queue: OutboundQueue) -> Result<Self> {
        let mut connection = Connection::open(config.server, config.variant)?;
        let poll = Poll::new()?;
        connection.register(poll.registry(), SOCKET)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);
        queue.attach_waker(waker.clone());

        Ok(Self {
            config,
            connection,
            poll,
            events: Events::with_capacity(16),
            queue,
            state: ConnectionState::Connecting,
            assignment: None,
            stop: StopHandle {
                stopped: Arc::new(AtomicBool::new(false)),
                waker,
            },
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn assignment(&self) -> Option<Assignment> {
        self.assignment
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Send `ClientConnect` and block until the server assigns a slot.
    ///
    /// Liveness probes that arrive while waiting are echoed; other packets
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::ServerFull`] on refusal,
    /// [`ConnectionError::HandshakeTimeout`] when the configured timeout
    /// passes, and [`ConnectionError::Disconnected`] if the stream closes or
    /// the loop is stopped first.
    pub fn handshake(&mut self) -> Result<Assignment> {
        if let Some(assignment) = self.assignment {
            return Ok(assignment);
        }
        if self.state == ConnectionState::Disconnected {
            return Err(ConnectionError::Disconnected);
        }

        match self.connection.local_addr() {
            Ok(local) => info!(
                "connecting to {} over {} from {local}",
                self.connection.server(),
                self.connection.variant()
            ),
            Err(_) => info!(
                "connecting to {} over {}",
                self.connection.server(),
                self.connection.variant()
            ),
        }
        let mut connect =
            Packet::empty(PacketType::ClientConnect).with_version(self.config.version);
        self.connection.send_packet(&mut connect)?;

        let deadline = self
            .config
            .handshake_timeout
            .map(|timeout| (Instant::now() + timeout, timeout));

        loop {
            if self.stop.is_stopped() {
                self.disconnect("stopped while connecting");
                return Err(ConnectionError::Disconnected);
            }
            if let Err(error) = self.connection.flush() {
                warn!("failed to flush pending bytes: {error}");
            }

            loop {
                match self.connection.recv() {
                    Received::Delivered(packet) => match packet.kind {
                        PacketType::PlayerInfo => {
                            let assignment = Assignment {
                                player: packet.payload.first().copied(),
                            };
                            self.assignment = Some(assignment);
                            self.state = ConnectionState::Connected;
                            match assignment.player {
                                Some(player) => info!("connected as player {player}"),
                                None => info!("connected without a player slot"),
                            }
                            return Ok(assignment);
                        }
                        PacketType::ServerFull => {
                            self.disconnect("server is full");
                            return Err(ConnectionError::ServerFull);
                        }
                        kind if kind.is_liveness_probe() => self.echo(kind),
                        kind => debug!("ignoring {kind} packet while connecting"),
                    },
                    Received::WouldBlock => break,
                    Received::Rejected(error) => warn!("dropping malformed packet: {error}"),
                    Received::TransportError(reason) => {
                        warn!("transport error while connecting: {reason}");
                        break;
                    }
                    Received::Closed => {
                        self.disconnect("stream closed while connecting");
                        return Err(ConnectionError::Disconnected);
                    }
                }
            }

            let timeout = match deadline {
                Some((deadline, timeout)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.disconnect("handshake timed out");
                        return Err(ConnectionError::HandshakeTimeout(timeout));
                    }
                    (deadline - now).min(self.config.poll_interval)
                }
                None => self.config.poll_interval,
            };
            self.wait(timeout)?;
        }
    }

    /// Run cycles until the loop disconnects, passing every non-probe
    /// packet to `deliver`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the poller itself fails.
    pub fn run<F: FnMut(Packet)>(&mut self, mut deliver: F) -> Result<()> {
        while self.cycle(&mut deliver)? == ConnectionState::Connected {}
        Ok(())
    }

    /// Run a single cycle: send queued packets, receive what is available,
    /// then wait for readiness if the socket was drained.
    ///
    /// Does nothing unless the loop is connected.
    ///
    /// # Errors
    ///
    /// Returns an error only if the poller itself fails.
    pub fn cycle<F: FnMut(Packet)>(&mut self, deliver: &mut F) -> Result<ConnectionState> {
        if self.state != ConnectionState::Connected {
            return Ok(self.state);
        }
        if self.stop.is_stopped() {
            self.disconnect("stop requested");
            return Ok(self.state);
        }

        self.send_queued();

        let drained = self.receive_available(deliver);
        if self.state == ConnectionState::Connected && drained {
            self.wait(self.config.poll_interval)?;
        }
        Ok(self.state)
    }

    fn send_queued(&mut self) {
        if let Err(error) = self.connection.flush() {
            warn!("failed to flush pending bytes: {error}");
        }
        for mut packet in self.queue.drain_all() {
            self.send(&mut packet);
        }
    }

    /// Receive until the socket would block. Returns `false` if the
    /// per-cycle limit cut the batch short.
    fn receive_available<F: FnMut(Packet)>(&mut self, deliver: &mut F) -> bool {
        for _ in 0..MAX_RECEIVES_PER_CYCLE {
            match self.connection.recv() {
                Received::Delivered(packet) => self.dispatch(packet, deliver),
                Received::WouldBlock => return true,
                Received::Rejected(error) => warn!("dropping malformed packet: {error}"),
                Received::TransportError(reason) => {
                    // Treated like would-block: wait and try again.
                    warn!("transport error: {reason}");
                    return true;
                }
                Received::Closed => {
                    self.disconnect("server closed the stream");
                    return true;
                }
            }
        }
        false
    }

    fn dispatch<F: FnMut(Packet)>(&mut self, packet: Packet, deliver: &mut F) {
        debug!(
            "received {} seq={} with {} byte payload",
            packet.kind,
            packet.local_seq,
            packet.size()
        );
        if packet.kind.is_liveness_probe() {
            self.echo(packet.kind);
            return;
        }
        if self.config.variant.is_sequenced() && packet.has_flag(FLAG_EXPLICITACK) {
            let mut ack = Packet::empty(PacketType::Ackbeat)
                .with_version(self.config.version)
                .with_flags(FLAG_UNRELIABLE);
            self.send(&mut ack);
        }
        deliver(packet);
    }

    fn echo(&mut self, kind: PacketType) {
        let mut reply = Packet::empty(kind).with_version(self.config.version);
        self.send(&mut reply);
    }

    fn send(&mut self, packet: &mut Packet) {
        match self.connection.send_packet(packet) {
            Ok(()) => debug!(
                "sent {} seq={} with {} byte payload",
                packet.kind,
                packet.local_seq,
                packet.size()
            ),
            Err(error) => warn!("failed to send {} packet: {error}", packet.kind),
        }
    }

    fn wait(&mut self, timeout: Duration) -> Result<()> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    fn disconnect(&mut self, reason: &str) {
        if self.state != ConnectionState::Disconnected {
            info!("disconnected from {}: {reason}", self.config.server);
            self.state = ConnectionState::Disconnected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let server = "127.0.0.1:6460".parse().unwrap();
        let config = ConnectionConfig::new(server, ProtocolVariant::Datagram);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.handshake_timeout, None);
        assert_eq!(config.version, NETLIB_VERSION);
    }

    #[test]
    fn test_assignment_recipients() {
        assert_eq!(Assignment { player: Some(1) }.recipients(), 0b1);
        assert_eq!(Assignment { player: Some(4) }.recipients(), 0b1000);
        assert_eq!(Assignment { player: Some(32) }.recipients(), 1 << 31);
        assert_eq!(Assignment { player: Some(0) }.recipients(), 0);
        assert_eq!(Assignment { player: None }.recipients(), 0);
    }

    #[test]
    fn test_open_starts_connecting() {
        let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = ConnectionConfig::new(server.local_addr().unwrap(), ProtocolVariant::Datagram);
        let connection_loop = ConnectionLoop::open(config, OutboundQueue::new()).unwrap();
        assert_eq!(connection_loop.state(), ConnectionState::Connecting);
        assert_eq!(connection_loop.assignment(), None);
    }

    #[test]
    fn test_cycle_before_handshake_is_a_no_op() {
        let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = ConnectionConfig::new(server.local_addr().unwrap(), ProtocolVariant::Datagram);
        let queue = OutboundQueue::new();
        let mut connection_loop = ConnectionLoop::open(config, queue.clone()).unwrap();
        queue.push(Packet::empty(PacketType::PlayerReady));

        let state = connection_loop.cycle(&mut |_: Packet| {}).unwrap();
        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_stop_while_connecting() {
        let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = ConnectionConfig::new(server.local_addr().unwrap(), ProtocolVariant::Datagram);
        let mut connection_loop = ConnectionLoop::open(config, OutboundQueue::new()).unwrap();
        connection_loop.stop_handle().stop();
        assert!(matches!(
            connection_loop.handshake(),
            Err(ConnectionError::Disconnected)
        ));
        assert_eq!(connection_loop.state(), ConnectionState::Disconnected);
    }
}
