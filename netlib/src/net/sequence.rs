use super::packet::DEFAULT_ACK_FIELD;

/// Number of remote sequence numbers the ack window covers.
pub const ACK_WINDOW_BITS: u16 = 16;

/// Sequence bookkeeping for one connection.
///
/// Owned by the connection that sends and receives with it, so no
/// synchronisation is needed. The local counter wraps modulo 2^16 to match
/// the 16-bit wire field.
///
/// The ack window is a bitmask anchored at the remote high-water mark: bit
/// `i` set means `hwm - (i + 1)` has been observed. It starts fully set
/// (nothing outstanding). It is stamped on every datagram but never drives
/// retransmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceTracker {
    local: u16,
    remote_high_water_mark: u16,
    ack_window: u16,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// A tracker whose next local sequence number is `local`.
    pub fn starting_at(local: u16) -> Self {
        Self {
            local,
            remote_high_water_mark: 0,
            ack_window: DEFAULT_ACK_FIELD,
        }
    }

    /// Return the current local sequence number and advance the counter.
    pub fn next_local(&mut self) -> u16 {
        let seq = self.local;
        self.local = self.local.wrapping_add(1);
        seq
    }

    /// The value the next call to [`Self::next_local`] returns.
    pub fn peek_local(&self) -> u16 {
        self.local
    }

    pub fn remote_high_water_mark(&self) -> u16 {
        self.remote_high_water_mark
    }

    /// Record a sequence number seen from the peer.
    ///
    /// The high-water mark becomes `max(current, seq)`, so duplicates and
    /// out-of-order arrivals never lower it.
    pub fn observe_remote(&mut self, seq: u16) {
        let hwm = self.remote_high_water_mark;
        if seq > hwm {
            let shift = seq - hwm;
            self.ack_window = if shift >= ACK_WINDOW_BITS {
                0
            } else {
                self.ack_window << shift
            };
            // The old mark is now `shift` behind the new one.
            if shift <= ACK_WINDOW_BITS {
                self.ack_window |= 1 << (shift - 1);
            }
            self.remote_high_water_mark = seq;
        } else if seq < hwm {
            let distance = hwm - seq;
            if distance <= ACK_WINDOW_BITS {
                self.ack_window |= 1 << (distance - 1);
            }
        }
    }

    /// Ack field to stamp on the next outbound datagram.
    pub fn ack_field(&self) -> u16 {
        self.ack_window
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
