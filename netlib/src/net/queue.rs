use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

use log::{debug, warn};
use mio::Waker;

use super::packet::Packet;

#[derive(Debug, Default)]
struct Inner {
    packets: Mutex<VecDeque<Packet>>,
    waker: Mutex<Option<Arc<Waker>>>,
}

/// Unbounded FIFO of packets waiting to be sent.
///
/// Cloning yields another handle to the same queue, so a producer thread and
/// the connection loop can each hold one. Every push and every drain takes
/// the lock exactly once, so neither side ever observes a partial operation.
///
/// There is no capacity bound: a producer that persistently outpaces the
/// loop grows the queue without limit.
#[derive(Clone, Debug, Default)]
pub struct OutboundQueue {
    inner: Arc<Inner>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet without blocking on the network side.
    ///
    /// If a connection loop has attached its waker, it is woken so the
    /// packet goes out without waiting for the poll timeout.
    pub fn push(&self, packet: Packet) {
        self.inner
            .packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(packet);
        let waker = self
            .inner
            .waker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(Err(error)) = waker.map(|waker| waker.wake()) {
            warn!("failed to wake connection loop: {error}");
        }
    }

    /// Remove and return everything queued so far, oldest first.
    pub fn drain_all(&self) -> Vec<Packet> {
        let mut packets = self
            .inner
            .packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        packets.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register the waker pushes should trigger. The most recently opened
    /// loop replaces any earlier one.
    pub(crate) fn attach_waker(&self, waker: Arc<Waker>) {
        let previous = self
            .inner
            .waker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(waker);
        if previous.is_some() {
            debug!("replaced the waker of an earlier connection loop");
        }
    }
}
