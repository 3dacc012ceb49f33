//! Pipeline counters.

use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Counters shared by all stations. Cheap to read at any time.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub segments: AtomicU64,
    pub overload_drops: AtomicU64,
    pub translate_failures: AtomicU64,
    pub synthesize_failures: AtomicU64,
    pub transmit_failures: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub segments: u64,
    pub overload_drops: u64,
    pub translate_failures: u64,
    pub synthesize_failures: u64,
    pub transmit_failures: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            segments: self.segments.load(Ordering::Relaxed),
            overload_drops: self.overload_drops.load(Ordering::Relaxed),
            translate_failures: self.translate_failures.load(Ordering::Relaxed),
            synthesize_failures: self.synthesize_failures.load(Ordering::Relaxed),
            transmit_failures: self.transmit_failures.load(Ordering::Relaxed),
        }
    }
}

/// Non-blocking enqueue with drop-newest overload behavior.
///
/// Returns false if the item was dropped because the queue was full or the
/// consumer is gone. Full-queue drops are counted.
pub fn offer<T>(tx: &Sender<T>, item: T, queue: &'static str, stats: &PipelineStats) -> bool {
    match tx.try_send(item) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(queue, "queue full, dropping newest item");
            stats.overload_drops.fetch_add(1, Ordering::Relaxed);
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}
