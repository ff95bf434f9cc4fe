//! Order-preserving parallel transform

use std::future::Future;

use super::{BatchHandle, launch};
use crate::error::SluiceResult;
use crate::unit;

/// Transform every element of `source` with `func`, at most `limit` at once.
///
/// `result[i]` is always `func(source[i])`, whatever order the invocations finish
/// in. Elements are admitted in source order. Failure semantics match
/// [`times`](super::times): the handle fails if any element failed, after every
/// element has been processed.
///
/// Must be called from within a Tokio runtime.
pub fn map<T, R, E, F, Fut>(
    source: impl IntoIterator<Item = T>,
    limit: usize,
    func: F,
) -> SluiceResult<BatchHandle<Vec<R>>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
    launch(source.into_iter().collect(), limit, unit::erase(func), |values| values)
}
