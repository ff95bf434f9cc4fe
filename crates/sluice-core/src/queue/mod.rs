//! Dynamic job queue with bounded concurrency
//!
//! Jobs arrive one at a time and run through a per-item action, at most `limit`
//! of them at once, admitted in submission order.
//!
//! - `count()` is the number of submitted jobs that have not settled yet. It is
//!   incremented before the job waits for a permit and decremented only after the
//!   job fully settled, so it never under-reports outstanding work.
//! - Drain observers fire on every transition of `count()` to zero, once per
//!   transition.
//! - A failing job never affects other jobs or the accounting. Its failure goes to
//!   its own handle (propagating mode) and always to the unhandled-error observers.

mod events;
mod handle;


pub use events::{ObserverId, QueueEvent};
pub use handle::JobHandle;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::config::QueueConfig;
use crate::error::{SluiceError, SluiceResult, WorkFailure};
use crate::gate::{AdmissionGate, Permit, Ticket};
use crate::unit::{self, Action, UnitFuture};
use events::Observers;

/// Whether a job's failure reaches the caller's handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Propagation {
    Propagate,
    Swallow,
}

/// Where a job stands when its task is spawned
enum Stage<T> {
    /// Admitted at submission; the action is already running
    Running(Permit, UnitFuture<()>),
    /// Waiting behind earlier jobs for a permit
    Queued(Ticket, T),
}

struct QueueInner<T> {
    name: String,
    limit: usize,
    method: Box<Action<T, ()>>,
    gate: AdmissionGate,
    live: AtomicU64,
    disposed: AtomicBool,
    observers: Observers,
}

/// Thread-safe FIFO job queue.
///
/// Must be used from within a Tokio runtime. Dropping the queue does not dispose
/// it: jobs already submitted keep running to completion.
///
/// # Example
///
/// ```rust
/// use sluice_core::JobQueue;
///
/// #[tokio::main]
/// async fn main() {
///     let queue = JobQueue::new(2, |n: u64| async move {
///         tokio::task::yield_now().await;
///         if n == 3 { anyhow::bail!("three is unlucky") }
///         Ok(())
///     })
///     .unwrap();
///
///     let ok = queue.enqueue(1).unwrap();
///     let failing = queue.enqueue(3).unwrap();
///     assert!(ok.await.is_ok());
///     assert!(failing.await.is_err());
///     assert_eq!(queue.count(), 0);
/// }
/// ```
pub struct JobQueue<T> {
    inner: Arc<QueueInner<T>>,
}

/// Create a job queue running `method` for every item, `limit` at a time
pub fn create_queue<T, E, F, Fut>(limit: usize, method: F) -> SluiceResult<JobQueue<T>>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
    JobQueue::new(limit, method)
}

impl<T: Send + 'static> JobQueue<T> {
    /// Create a queue with the default configuration and the given limit
    pub fn new<E, F, Fut>(limit: usize, method: F) -> SluiceResult<Self>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        Self::with_config(QueueConfig::new(limit), method)
    }

    /// Create a queue from an explicit configuration
    pub fn with_config<E, F, Fut>(config: QueueConfig, method: F) -> SluiceResult<Self>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        config.validate()?;
        let gate = AdmissionGate::new(config.limit)?;
        tracing::debug!(queue = %config.name, limit = config.limit, "job queue created");

        Ok(Self {
            inner: Arc::new(QueueInner {
                name: config.name,
                limit: config.limit,
                method: unit::erase(method),
                gate,
                live: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
                observers: Observers::new(config.event_capacity),
            }),
        })
    }

    /// Submit a job; its failure propagates to the returned handle.
    ///
    /// Fails with [`SluiceError::Disposed`] if the queue was disposed.
    pub fn enqueue(&self, item: T) -> SluiceResult<JobHandle> {
        self.submit(item, Propagation::Propagate).map(JobHandle::new)
    }

    /// Submit a job whose handle always succeeds.
    ///
    /// Failures are still reported to the unhandled-error observers.
    pub fn enqueue_ignore_errors(&self, item: T) -> SluiceResult<JobHandle> {
        self.submit(item, Propagation::Swallow).map(JobHandle::new)
    }

    /// Submit a job without keeping a handle (fire and forget)
    pub fn try_enqueue(&self, item: T) -> SluiceResult<()> {
        self.submit(item, Propagation::Swallow).map(drop)
    }

    fn submit(
        &self,
        item: T,
        mode: Propagation,
    ) -> SluiceResult<tokio::task::JoinHandle<SluiceResult<()>>> {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::Acquire) {
            return Err(SluiceError::Disposed);
        }

        let live = inner.live.fetch_add(1, Ordering::AcqRel) + 1;
        let mut ticket = match inner.gate.reserve() {
            Ok(ticket) => ticket,
            Err(_) => {
                // Lost the race with `dispose`; nothing was started.
                inner.settle();
                return Err(SluiceError::Disposed);
            }
        };

        let stage = match ticket.try_take() {
            Some(permit) => Stage::Running(permit, (inner.method)(item)),
            None => Stage::Queued(ticket, item),
        };
        tracing::debug!(
            queue = %inner.name,
            live,
            admitted = matches!(stage, Stage::Running(..)),
            "job submitted"
        );

        let inner = Arc::clone(inner);
        Ok(tokio::spawn(inner.drive(stage, mode)))
    }

    /// Number of submitted jobs that have not settled yet (running or waiting)
    pub fn count(&self) -> u64 {
        self.inner.live.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Jobs waiting for a permit
    pub fn waiting(&self) -> usize {
        self.inner.gate.waiting()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Stop admitting jobs.
    ///
    /// Running jobs finish normally. Jobs still waiting for a permit are abandoned
    /// and their handles fail with [`SluiceError::Disposed`]. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.gate.dispose();
        tracing::debug!(queue = %self.inner.name, live = self.count(), "job queue disposed");
    }

    /// Register a callback for every transition of `count()` to zero
    pub fn on_drained<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(DateTime<Utc>) + Send + Sync + 'static,
    {
        self.inner.observers.add_drained(Arc::new(observer))
    }

    /// Register a callback for every failed job, whatever its propagation mode
    pub fn on_unhandled_error<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&WorkFailure) + Send + Sync + 'static,
    {
        self.inner.observers.add_failed(Arc::new(observer))
    }

    /// Remove a previously registered callback
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.observers.remove(id)
    }

    /// Subscribe to the queue's event stream
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.observers.subscribe()
    }

    /// Number of live event stream subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.observers.subscriber_count()
    }
}

impl<T> std::fmt::Debug for JobQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("name", &self.inner.name)
            .field("limit", &self.inner.limit)
            .field("count", &self.inner.live.load(Ordering::Relaxed))
            .field("disposed", &self.inner.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: Send + 'static> QueueInner<T> {
    async fn drive(self: Arc<Self>, stage: Stage<T>, mode: Propagation) -> SluiceResult<()> {
        let (permit, work) = match stage {
            Stage::Running(permit, work) => (permit, work),
            Stage::Queued(ticket, item) => match ticket.await {
                Ok(permit) => {
                    let work = (self.method)(item);
                    (permit, work)
                }
                Err(_) => {
                    tracing::warn!(queue = %self.name, "queue disposed before job was admitted; job abandoned");
                    self.settle();
                    return match mode {
                        Propagation::Propagate => Err(SluiceError::Disposed),
                        Propagation::Swallow => Ok(()),
                    };
                }
            },
        };

        let outcome = work.await;
        drop(permit);

        let result = match outcome {
            Ok(()) => Ok(()),
            Err(failure) => {
                tracing::debug!(queue = %self.name, error = %failure, "job failed");
                self.observers.notify_failed(&self.name, &failure);
                match mode {
                    Propagation::Propagate => Err(SluiceError::Work(failure)),
                    Propagation::Swallow => Ok(()),
                }
            }
        };
        self.settle();
        result
    }
}

impl<T> QueueInner<T> {
    /// Account for one settled job; fires the drain observers on the zero transition
    fn settle(&self) {
        if self.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            let at = Utc::now();
            tracing::debug!(queue = %self.name, %at, "job queue drained");
            self.observers.notify_drained(&self.name, at);
        }
    }
}
