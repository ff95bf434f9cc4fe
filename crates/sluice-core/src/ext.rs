//! Future extensions layered on top of the engine's handles
//!
//! None of these take part in admission control; they wrap whatever future they
//! are given, including [`JobHandle`](crate::JobHandle) and
//! [`BatchHandle`](crate::BatchHandle).

use std::future::Future;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{SluiceError, SluiceResult};

/// Fail with [`SluiceError::Timeout`] if `future` does not finish in time.
///
/// ```rust,ignore
/// let value = with_timeout(some_long_operation(), Duration::from_secs(2)).await?;
/// ```
pub async fn with_timeout<F: Future>(future: F, after: Duration) -> SluiceResult<F::Output> {
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| SluiceError::timeout(after))
}

/// Fail with [`SluiceError::Cancelled`] as soon as `token` is cancelled
pub async fn with_cancellation<F: Future>(
    future: F,
    token: &CancellationToken,
) -> SluiceResult<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SluiceError::Cancelled),
        output = future => Ok(output),
    }
}

/// Spawn a fallible future without awaiting it.
///
/// A failure goes to `on_error`, or is logged when no callback is given.
pub fn fire_and_forget<Fut, E, H>(future: Fut, on_error: Option<H>)
where
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
    H: FnOnce(anyhow::Error) + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(error) = future.await {
            let error = error.into();
            match on_error {
                Some(handler) => handler(error),
                None => tracing::error!(error = %error, "fire-and-forget task failed"),
            }
        }
    });
}

/// Run independent task factories with at most `limit` in flight.
///
/// Outputs are collected in completion order; there is no positional guarantee
/// (use [`map`](crate::map) for that). A `limit` of zero is treated as one.
pub async fn throttle<I, F, Fut>(factories: I, limit: usize) -> Vec<Fut::Output>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future,
{
    let limit = limit.max(1);
    let mut running = FuturesUnordered::new();
    let mut completed = Vec::new();

    for factory in factories {
        running.push(factory());
        if running.len() == limit {
            if let Some(output) = running.next().await {
                completed.push(output);
            }
        }
    }
    while let Some(output) = running.next().await {
        completed.push(output);
    }

    completed
}
