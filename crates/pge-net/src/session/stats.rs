//! Traffic counters shared between a session's loops and its owner.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for one session.
#[derive(Debug, Default)]
pub struct SessionStats {
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
    datagrams_received: AtomicU64,
    bytes_received: AtomicU64,
    decode_errors: AtomicU64,
    rejected_sends: AtomicU64,
    transport_errors: AtomicU64,
    oversized_datagrams: AtomicU64,
    dropped_datagrams: AtomicU64,
}

impl SessionStats {
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_send(&self) {
        self.rejected_sends.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_oversized_datagram(&self) {
        self.oversized_datagrams.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_datagram(&self) {
        self.dropped_datagrams.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            rejected_sends: self.rejected_sends.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            oversized_datagrams: self.oversized_datagrams.load(Ordering::Relaxed),
            dropped_datagrams: self.dropped_datagrams.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Datagrams handed to the socket.
    pub datagrams_sent: u64,
    /// Payload bytes handed to the socket.
    pub bytes_sent: u64,
    /// Datagrams read from the socket.
    pub datagrams_received: u64,
    /// Payload bytes read from the socket.
    pub bytes_received: u64,
    /// Received datagrams the codec could not decode.
    pub decode_errors: u64,
    /// Sends refused because the payload was too large or failed to encode.
    pub rejected_sends: u64,
    /// Socket send or receive failures.
    pub transport_errors: u64,
    /// Received datagrams longer than the maximum datagram size.
    pub oversized_datagrams: u64,
    /// Received datagrams discarded because the event queue was full.
    pub dropped_datagrams: u64,
}
