//! Fixed-size batches with bounded concurrency
//!
//! This module contains the batch runner behind two operations:
//! - `times`: run `action(i)` for every `i` in `0..count`
//! - `map`: run `func(source[i])` and collect `result[i]` in source order
//!
//! A batch is a fixed array of slots. A driver task admits slots in ascending
//! index order through an [`AdmissionGate`]. Each admitted unit writes its outcome
//! into its own slot and counts down; the unit that reaches zero resolves the
//! [`BatchHandle`]. Completion order never affects slot positions, and a failed
//! slot never stops the others from running.

mod map;
mod times;


pub use map::map;
pub use times::times;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{AggregateFailure, SluiceError, SluiceResult, WorkFailure};
use crate::gate::AdmissionGate;
use crate::unit::Action;

/// Settled / total slot counters shared with the handle
#[derive(Debug)]
struct Progress {
    len: usize,
    remaining: AtomicUsize,
}

struct BatchState<R, O> {
    progress: Arc<Progress>,
    slots: Mutex<Vec<Option<R>>>,
    failures: Mutex<Vec<(usize, WorkFailure)>>,
    done: Mutex<Option<oneshot::Sender<SluiceResult<O>>>>,
    finalize: fn(Vec<R>) -> O,
}

impl<R, O> BatchState<R, O> {
    fn settle(&self, index: usize, outcome: Result<R, WorkFailure>) {
        match outcome {
            Ok(value) => self.slots.lock()[index] = Some(value),
            Err(failure) => {
                tracing::debug!(index, error = %failure, "batch unit failed");
                self.failures.lock().push((index, failure));
            }
        }
        if self.progress.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.complete();
        }
    }

    fn complete(&self) {
        let failures = std::mem::take(&mut *self.failures.lock());
        let result = if failures.is_empty() {
            let values: Vec<R> = std::mem::take(&mut *self.slots.lock())
                .into_iter()
                .flatten()
                .collect();
            debug_assert_eq!(values.len(), self.progress.len);
            Ok((self.finalize)(values))
        } else {
            Err(SluiceError::Aggregate(AggregateFailure::new(failures)))
        };

        tracing::debug!(len = self.progress.len, ok = result.is_ok(), "batch settled");
        if let Some(done) = self.done.lock().take() {
            let _ = done.send(result);
        }
    }
}

/// Start a batch over `items`, at most `limit` units in flight
fn launch<T, R, O>(
    items: Vec<T>,
    limit: usize,
    action: Box<Action<T, R>>,
    finalize: fn(Vec<R>) -> O,
) -> SluiceResult<BatchHandle<O>>
where
    T: Send + 'static,
    R: Send + 'static,
    O: Send + 'static,
{
    let gate = AdmissionGate::new(limit)?;
    let len = items.len();
    let progress = Arc::new(Progress {
        len,
        remaining: AtomicUsize::new(len),
    });
    let (tx, rx) = oneshot::channel();
    let state = Arc::new(BatchState {
        progress: Arc::clone(&progress),
        slots: Mutex::new((0..len).map(|_| None).collect()),
        failures: Mutex::new(Vec::new()),
        done: Mutex::new(Some(tx)),
        finalize,
    });
    let handle = BatchHandle { rx, progress };

    if len == 0 {
        state.complete();
        return Ok(handle);
    }

    tracing::debug!(len, limit, "batch started");
    tokio::spawn(async move {
        for (index, item) in items.into_iter().enumerate() {
            // The gate is private to this batch and never disposed.
            let Ok(permit) = gate.acquire().await else {
                return;
            };
            let work = action(item);
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let outcome = work.await;
                drop(permit);
                state.settle(index, outcome);
            });
        }
    });

    Ok(handle)
}

/// Resolves once every slot of a batch has settled.
///
/// Succeeds iff every unit succeeded; otherwise fails with
/// [`SluiceError::Aggregate`] carrying every failure. Dropping the handle does not
/// stop the batch.
#[derive(Debug)]
#[must_use = "a batch keeps running when its handle is dropped"]
pub struct BatchHandle<O> {
    rx: oneshot::Receiver<SluiceResult<O>>,
    progress: Arc<Progress>,
}

impl<O> BatchHandle<O> {
    /// Number of slots in the batch
    pub fn len(&self) -> usize {
        self.progress.len
    }

    pub fn is_empty(&self) -> bool {
        self.progress.len == 0
    }

    /// Number of slots that reached a terminal state
    pub fn settled(&self) -> usize {
        self.progress.len - self.progress.remaining.load(Ordering::Acquire)
    }

    /// Whether every slot has settled
    pub fn is_settled(&self) -> bool {
        self.progress.remaining.load(Ordering::Acquire) == 0
    }
}

impl<O> Future for BatchHandle<O> {
    type Output = SluiceResult<O>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(SluiceError::Cancelled)))
    }
}
