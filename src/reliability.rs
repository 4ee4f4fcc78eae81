//! Ack bookkeeping, loss detection and connection statistics.

use tracing::trace;

use crate::queue::{PacketQueue, PacketRecord};
use crate::sequence::{bit_index, is_more_recent, MAX_SEQUENCE};

/// Smoothing factor for the round trip time moving average.
const RTT_SMOOTHING: f32 = 0.1;

/// Slack applied to queue retention thresholds.
const EPSILON: f32 = 0.001;

/// Default ceiling for the expected round trip time in seconds.
pub const DEFAULT_RTT_MAX: f32 = 1.0;

/// Reach of the received-packet queue in sequence numbers. Covers the
/// ack sequence, the 32 vector bits and a little slack.
const RECV_QUEUE_REACH: u32 = 34;

/// Host notification handler, called with a packet sequence number.
pub type SequenceHandler = Box<dyn FnMut(u32) + Send>;

/// Read-only snapshot of the connection statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    /// Packets sent
    pub sent_packets: u64,
    /// Packets received
    pub recv_packets: u64,
    /// Packets confirmed acknowledged
    pub acked_packets: u64,
    /// Packets declared lost
    pub lost_packets: u64,
    /// Bytes sent, headers included
    pub sent_bytes: u64,
    /// Bytes received, headers included
    pub recv_bytes: u64,
    /// Sent bandwidth over the last `rtt_max` window, in kilobits per second
    pub sent_bandwidth: f32,
    /// Acknowledged bandwidth over the last `rtt_max` window, in kilobits per second
    pub acked_bandwidth: f32,
    /// Estimated round trip time in seconds
    pub rtt: f32,
    /// Next sequence number to assign on send
    pub local_sequence: u32,
    /// Newest sequence number observed from the peer
    pub remote_sequence: u32,
}

/// The reliability engine for a single two-way connection.
///
/// Assigns local sequence numbers, tracks remote ones, composes the ack
/// vector for outgoing headers and consumes the ack information carried by
/// incoming headers. Sent packets end up classified as either acknowledged
/// or lost; the host decides what, if anything, to retransmit.
///
/// Not safe for concurrent mutation. Callers either alternate
/// `packet_sent` / `packet_received` / `tick` on one thread or serialise
/// all three behind a single mutex, as
/// [`Connection`](crate::connection::Connection) does.
pub struct Reliability {
    /// Sent packets, kept one `rtt_max` window for bandwidth accounting.
    sent_queue: PacketQueue,
    /// Sent packets not yet acknowledged.
    pending_ack_queue: PacketQueue,
    /// Received packets, used to compose the outgoing ack vector.
    recv_queue: PacketQueue,
    /// Acknowledged packets, kept two `rtt_max` windows for bandwidth accounting.
    acked_queue: PacketQueue,

    local_sequence: u32,
    remote_sequence: u32,

    sent_packets: u64,
    recv_packets: u64,
    acked_packets: u64,
    lost_packets: u64,
    sent_bytes: u64,
    recv_bytes: u64,

    rtt: f32,
    rtt_max: f32,
    sent_bandwidth: f32,
    acked_bandwidth: f32,

    on_acked: Option<SequenceHandler>,
    on_lost: Option<SequenceHandler>,
}

impl Default for Reliability {
    fn default() -> Self {
        Self::new()
    }
}

impl Reliability {
    /// Creates a reliability engine in the reset state.
    pub fn new() -> Self {
        Self::with_rtt_max(DEFAULT_RTT_MAX)
    }

    /// Creates a reliability engine with the given round trip time ceiling.
    pub fn with_rtt_max(rtt_max: f32) -> Self {
        Self {
            sent_queue: PacketQueue::new(),
            pending_ack_queue: PacketQueue::new(),
            recv_queue: PacketQueue::new(),
            acked_queue: PacketQueue::new(),
            local_sequence: 0,
            remote_sequence: 0,
            sent_packets: 0,
            recv_packets: 0,
            acked_packets: 0,
            lost_packets: 0,
            sent_bytes: 0,
            recv_bytes: 0,
            rtt: 0.0,
            rtt_max,
            sent_bandwidth: 0.0,
            acked_bandwidth: 0.0,
            on_acked: None,
            on_lost: None,
        }
    }

    /// Registers a handler invoked once for every acknowledged sequence.
    ///
    /// The handler runs synchronously from inside `packet_received` and
    /// must not call back into the connection.
    pub fn set_acked_handler(&mut self, handler: impl FnMut(u32) + Send + 'static) {
        self.on_acked = Some(Box::new(handler));
    }

    /// Registers a handler invoked once for every lost sequence.
    ///
    /// The handler runs synchronously from inside `tick` and must not call
    /// back into the connection.
    pub fn set_lost_handler(&mut self, handler: impl FnMut(u32) + Send + 'static) {
        self.on_lost = Some(Box::new(handler));
    }

    /// Records an outgoing packet of the given size, header included.
    pub fn packet_sent(&mut self, size: u32) {
        let pd = PacketRecord::new(self.local_sequence, size);

        self.sent_queue.insert(pd);
        self.pending_ack_queue.insert(pd);
        self.sent_packets += 1;
        self.sent_bytes += u64::from(size);
        self.local_sequence = self.local_sequence.wrapping_add(1);
    }

    /// Records an incoming packet and processes its piggybacked acks.
    ///
    /// `size` is the full datagram size, header included. Duplicate
    /// sequences are absorbed silently, but the ack field still drives
    /// `process_ack` since it may newly acknowledge pending packets.
    pub fn packet_received(&mut self, sequence: u32, ack: u32, ack_vector: u32, size: u32) {
        self.recv_packets += 1;
        self.recv_bytes += u64::from(size);

        if !self.recv_queue.exists(sequence) {
            self.recv_queue.insert(PacketRecord::new(sequence, size));
        }

        if is_more_recent(sequence, self.remote_sequence) {
            self.remote_sequence = sequence;
        }

        self.process_ack(ack, ack_vector);
    }

    /// Composes the ack vector to transmit alongside the remote sequence.
    pub fn ack_vector(&self) -> u32 {
        let mut vector = 0u32;
        let ack = self.remote_sequence;

        for pd in self.recv_queue.iter() {
            if pd.sequence == ack || is_more_recent(pd.sequence, ack) {
                break;
            }

            let bit = bit_index(pd.sequence, ack);

            if bit <= 31 {
                vector |= 1 << bit;
            }
        }

        vector
    }

    /// Handles a single incoming ack with ack vector.
    fn process_ack(&mut self, ack: u32, vector: u32) {
        let mut i = 0;

        while i < self.pending_ack_queue.len() {
            let pd = match self.pending_ack_queue.get(i) {
                Some(pd) => *pd,
                None => break,
            };

            let mut acked = false;

            if pd.sequence == ack {
                acked = true;
            } else if is_more_recent(ack, pd.sequence) {
                let bit = bit_index(pd.sequence, ack);

                if bit <= 31 {
                    acked = (vector >> bit) & 1 != 0;
                }
            }

            if !acked {
                i += 1;
                continue;
            }

            self.rtt += (pd.age - self.rtt) * RTT_SMOOTHING;
            self.acked_queue.insert(pd);
            self.acked_packets += 1;
            self.pending_ack_queue.remove_at(i);

            if let Some(on_acked) = self.on_acked.as_mut() {
                on_acked(pd.sequence);
            }
        }
    }

    /// Advances packet ages by `delta` seconds, expires stale queue
    /// entries and refreshes the bandwidth estimates.
    ///
    /// Packets pending acknowledgement for longer than `rtt_max` are
    /// declared lost, once each.
    pub fn tick(&mut self, delta: f32) {
        self.advance_queue_age(delta);
        self.expire_queues();
        self.update_bandwidth();
    }

    fn advance_queue_age(&mut self, delta: f32) {
        for pd in self.sent_queue.iter_mut() {
            pd.age += delta;
        }

        for pd in self.recv_queue.iter_mut() {
            pd.age += delta;
        }

        for pd in self.pending_ack_queue.iter_mut() {
            pd.age += delta;
        }

        for pd in self.acked_queue.iter_mut() {
            pd.age += delta;
        }
    }

    fn expire_queues(&mut self) {
        let threshold = self.rtt_max + EPSILON;

        while matches!(self.sent_queue.front(), Some(pd) if pd.age > threshold) {
            self.sent_queue.pop_front();
        }

        if let Some(back) = self.recv_queue.back() {
            let last = back.sequence;
            let min_seq = if last >= RECV_QUEUE_REACH {
                last - RECV_QUEUE_REACH
            } else {
                MAX_SEQUENCE - (RECV_QUEUE_REACH - last)
            };

            // Keep only records newer than min_seq. This bounds the queue
            // to the reach of the ack vector.
            while matches!(self.recv_queue.front(), Some(pd) if !is_more_recent(pd.sequence, min_seq))
            {
                self.recv_queue.pop_front();
            }
        }

        loop {
            let pd = match self.pending_ack_queue.front() {
                Some(pd) if pd.age > threshold => *pd,
                _ => break,
            };

            self.pending_ack_queue.pop_front();
            self.lost_packets += 1;
            trace!(sequence = pd.sequence, "packet timed out");

            if let Some(on_lost) = self.on_lost.as_mut() {
                on_lost(pd.sequence);
            }
        }

        let acked_threshold = 2.0 * self.rtt_max - EPSILON;

        while matches!(self.acked_queue.front(), Some(pd) if pd.age > acked_threshold) {
            self.acked_queue.pop_front();
        }
    }

    fn update_bandwidth(&mut self) {
        let sent: u64 = self.sent_queue.iter().map(|pd| u64::from(pd.size)).sum();

        let acked: u64 = self
            .acked_queue
            .iter()
            .filter(|pd| pd.age >= self.rtt_max)
            .map(|pd| u64::from(pd.size))
            .sum();

        let sent_per_sec = sent as f32 / self.rtt_max;
        let acked_per_sec = acked as f32 / self.rtt_max;

        self.sent_bandwidth = sent_per_sec * 8.0 / 1000.0;
        self.acked_bandwidth = acked_per_sec * 8.0 / 1000.0;
    }

    /// Restores the engine to its initial state.
    ///
    /// Empties every queue and zeroes counters, cursors and estimates.
    /// The configured round trip time ceiling is kept. Registered handlers
    /// survive a reset.
    pub fn reset(&mut self) {
        self.sent_queue.clear();
        self.pending_ack_queue.clear();
        self.recv_queue.clear();
        self.acked_queue.clear();

        self.local_sequence = 0;
        self.remote_sequence = 0;
        self.sent_packets = 0;
        self.recv_packets = 0;
        self.acked_packets = 0;
        self.lost_packets = 0;
        self.sent_bytes = 0;
        self.recv_bytes = 0;
        self.rtt = 0.0;
        self.sent_bandwidth = 0.0;
        self.acked_bandwidth = 0.0;
    }

    /// Next sequence number to assign on send.
    pub fn local_sequence(&self) -> u32 {
        self.local_sequence
    }

    /// Newest sequence number observed from the peer.
    pub fn remote_sequence(&self) -> u32 {
        self.remote_sequence
    }

    /// Estimated round trip time in seconds.
    pub fn rtt(&self) -> f32 {
        self.rtt
    }

    /// Ceiling for the expected round trip time in seconds.
    pub fn rtt_max(&self) -> f32 {
        self.rtt_max
    }

    /// Sent packets awaiting acknowledgement.
    pub fn pending_ack_count(&self) -> usize {
        self.pending_ack_queue.len()
    }

    /// Snapshot of the connection statistics.
    pub fn stats(&self) -> Stats {
        Stats {
            sent_packets: self.sent_packets,
            recv_packets: self.recv_packets,
            acked_packets: self.acked_packets,
            lost_packets: self.lost_packets,
            sent_bytes: self.sent_bytes,
            recv_bytes: self.recv_bytes,
            sent_bandwidth: self.sent_bandwidth,
            acked_bandwidth: self.acked_bandwidth,
            rtt: self.rtt,
            local_sequence: self.local_sequence,
            remote_sequence: self.remote_sequence,
        }
    }
}
