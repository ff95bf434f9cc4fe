//! Caller-facing completion handle for a submitted job

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::{SluiceError, SluiceResult, WorkFailure};

/// Resolves once the job has settled.
///
/// Dropping the handle does not cancel the job.
#[derive(Debug)]
#[must_use = "dropping a JobHandle detaches the job; use `try_enqueue` for fire-and-forget"]
pub struct JobHandle {
    task: JoinHandle<SluiceResult<()>>,
}

impl JobHandle {
    pub(super) fn new(task: JoinHandle<SluiceResult<()>>) -> Self {
        Self { task }
    }

    /// Whether the job has settled (successfully or not)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Future for JobHandle {
    type Output = SluiceResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(SluiceError::Work(WorkFailure::from_panic(e.into_panic()))),
            Err(_) => Err(SluiceError::Cancelled),
        })
    }
}
