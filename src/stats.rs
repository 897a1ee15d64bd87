//! Delivery counters shared between the worker and the shipper handle.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated by the worker without locking.
#[derive(Debug, Default)]
pub struct ShipperStats {
    delivered: AtomicU64,
    send_failures: AtomicU64,
    reconnect_attempts: AtomicU64,
    checkpointed: AtomicU64,
}

/// Point-in-time copy of [`ShipperStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Records handed to the transport successfully.
    pub delivered: u64,

    /// Send attempts that failed and triggered a reconnect.
    pub send_failures: u64,

    /// Connect calls made by the reconnect loop.
    pub reconnect_attempts: u64,

    /// Records written to the checkpoint at shutdown.
    pub checkpointed: u64,
}

impl ShipperStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect_attempts(&self, attempts: u32) {
        self.reconnect_attempts
            .fetch_add(u64::from(attempts), Ordering::Relaxed);
    }

    pub(crate) fn record_checkpointed(&self, count: usize) {
        self.checkpointed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            checkpointed: self.checkpointed.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    pub fn summary(&self) -> String {
        format!(
            "delivered={} send_failures={} reconnect_attempts={} checkpointed={}",
            self.delivered, self.send_failures, self.reconnect_attempts, self.checkpointed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = ShipperStats::new();
        stats.record_delivery();
        stats.record_delivery();
        stats.record_send_failure();
        stats.record_reconnect_attempts(3);
        stats.record_checkpointed(4);

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot,
            StatsSnapshot {
                delivered: 2,
                send_failures: 1,
                reconnect_attempts: 3,
                checkpointed: 4,
            }
        );
        assert_eq!(
            snapshot.summary(),
            "delivered=2 send_failures=1 reconnect_attempts=3 checkpointed=4"
        );
    }
}
