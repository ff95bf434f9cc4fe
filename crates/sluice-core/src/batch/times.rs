//! Fixed-count parallel iteration

use std::future::Future;

use super::{BatchHandle, launch};
use crate::error::SluiceResult;
use crate::unit;

/// Run `action(i)` for every `i` in `0..count`, at most `limit` at once.
///
/// Indices are admitted in ascending order: the first `limit` start right away and
/// each settled unit lets the next index in. The returned handle resolves once all
/// `count` invocations have settled, and fails if any of them failed; a failure
/// never stops the remaining indices from running.
///
/// Must be called from within a Tokio runtime.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let sum = Arc::new(AtomicUsize::new(0));
///     let s = sum.clone();
///     sluice_core::times(100, 8, move |i| {
///         let s = s.clone();
///         async move {
///             s.fetch_add(i, Ordering::SeqCst);
///             Ok::<_, anyhow::Error>(())
///         }
///     })
///     .unwrap()
///     .await
///     .unwrap();
///     assert_eq!(sum.load(Ordering::SeqCst), 4950);
/// }
/// ```
pub fn times<E, F, Fut>(count: usize, limit: usize, action: F) -> SluiceResult<BatchHandle<()>>
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
    launch((0..count).collect(), limit, unit::erase(action), |_| ())
}
