use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of per-session capture statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureStats {
    /// Frames delivered by the capture source this session.
    pub packets_received: u64,
    /// Frames dropped for parse failures or empty captures.
    pub packets_dropped: u64,
    /// Wire bytes of emitted packets.
    pub bytes_received: u64,
    /// Packets per second, computed by the controller's 1 Hz tick.
    pub current_rate: f64,
    pub start_time: DateTime<Utc>,
}

/// Lock-free counters updated by the worker, snapshotted by the
/// controller. A fresh set is created on every `start()`.
#[derive(Debug)]
pub(crate) struct Counters {
    pub packets_received: AtomicU64,
    pub packets_dropped: AtomicU64,
    pub bytes_received: AtomicU64,
    /// f64 bit pattern of the latest tick's rate.
    rate_bits: AtomicU64,
    start_time: DateTime<Utc>,
}

impl Counters {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Counters {
            packets_received: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            rate_bits: AtomicU64::new(0f64.to_bits()),
            start_time,
        }
    }

    pub fn set_rate(&self, rate: f64) {
        self.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            current_rate: f64::from_bits(self.rate_bits.load(Ordering::Relaxed)),
            start_time: self.start_time,
        }
    }
}
