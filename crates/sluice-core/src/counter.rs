//! Send/receive diagnostic counter

use std::sync::atomic::{AtomicU64, Ordering};

/// Two independent, monotonically increasing counters
#[derive(Debug, Default)]
pub struct SendReceiveCounter {
    sent: AtomicU64,
    received: AtomicU64,
}

impl SendReceiveCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one sent message; returns the new total
    pub fn increment_sent(&self) -> u64 {
        self.sent.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Count one received message; returns the new total
    pub fn increment_received(&self) -> u64 {
        self.received.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Acquire)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    /// Sent minus received, never below zero
    pub fn outstanding(&self) -> u64 {
        self.sent().saturating_sub(self.received())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_are_independent() {
        let counter = SendReceiveCounter::new();
        assert_eq!(counter.increment_sent(), 1);
        assert_eq!(counter.increment_sent(), 2);
        assert_eq!(counter.increment_received(), 1);

        assert_eq!(counter.sent(), 2);
        assert_eq!(counter.received(), 1);
        assert_eq!(counter.outstanding(), 1);
    }

    #[test]
    fn test_outstanding_saturates() {
        let counter = SendReceiveCounter::default();
        counter.increment_received();
        assert_eq!(counter.outstanding(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments() {
        let counter = Arc::new(SendReceiveCounter::new());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                tokio::spawn(async move {
                    for _ in 0..1000 {
                        counter.increment_sent();
                        counter.increment_received();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(counter.sent(), 8000);
        assert_eq!(counter.received(), 8000);
    }
}
