//! Queue observers and the queue event bus
//!
//! Two ways to watch a queue:
//! - callbacks registered with `on_drained` / `on_unhandled_error`, invoked
//!   synchronously on the task that settled the job
//! - a broadcast [`QueueEvent`] stream from `subscribe`

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::WorkFailure;

/// Events published by a job queue
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// The outstanding-job count dropped to zero
    Drained { at: DateTime<Utc> },

    /// A job failed, whatever its propagation mode
    Failed { failure: WorkFailure },
}

impl QueueEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Drained { .. } => "drained",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Identifies a registered observer so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type DrainedObserver = Arc<dyn Fn(DateTime<Utc>) + Send + Sync>;
type FailureObserver = Arc<dyn Fn(&WorkFailure) + Send + Sync>;

/// Registered callbacks plus the broadcast sender
pub(crate) struct Observers {
    next_id: AtomicU64,
    drained: RwLock<Vec<(ObserverId, DrainedObserver)>>,
    failed: RwLock<Vec<(ObserverId, FailureObserver)>>,
    bus: broadcast::Sender<QueueEvent>,
}

impl Observers {
    pub(crate) fn new(capacity: usize) -> Self {
        let (bus, _) = broadcast::channel(capacity.max(1));
        Self {
            next_id: AtomicU64::new(1),
            drained: RwLock::new(Vec::new()),
            failed: RwLock::new(Vec::new()),
            bus,
        }
    }

    fn next_id(&self) -> ObserverId {
        ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn add_drained(&self, observer: DrainedObserver) -> ObserverId {
        let id = self.next_id();
        self.drained.write().push((id, observer));
        id
    }

    pub(crate) fn add_failed(&self, observer: FailureObserver) -> ObserverId {
        let id = self.next_id();
        self.failed.write().push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut drained = self.drained.write();
        let before = drained.len();
        drained.retain(|(existing, _)| *existing != id);
        if drained.len() != before {
            return true;
        }
        drop(drained);

        let mut failed = self.failed.write();
        let before = failed.len();
        failed.retain(|(existing, _)| *existing != id);
        failed.len() != before
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.bus.subscribe()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.bus.receiver_count()
    }

    /// Notify drain observers. Callbacks run outside the registry lock so they may
    /// register or remove observers themselves.
    pub(crate) fn notify_drained(&self, queue: &str, at: DateTime<Utc>) {
        let observers: Vec<DrainedObserver> =
            self.drained.read().iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in observers {
            guard(queue, "drained", || observer(at));
        }
        let _ = self.bus.send(QueueEvent::Drained { at });
    }

    pub(crate) fn notify_failed(&self, queue: &str, failure: &WorkFailure) {
        let observers: Vec<FailureObserver> =
            self.failed.read().iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in observers {
            guard(queue, "unhandled_error", || observer(failure));
        }
        let _ = self.bus.send(QueueEvent::Failed {
            failure: failure.clone(),
        });
    }
}

/// Run an observer; a panic is logged and discarded
fn guard(queue: &str, kind: &'static str, observer: impl FnOnce()) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(observer)) {
        let failure = WorkFailure::from_panic(panic);
        tracing::warn!(queue, observer = kind, error = %failure, "queue observer panicked");
    }
}
