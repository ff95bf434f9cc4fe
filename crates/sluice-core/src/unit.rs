//! Invocation of caller-supplied actions
//!
//! Every action, whether it fails by returning an error, by panicking while being
//! called, or by panicking while its future is polled, is turned into a
//! `Result<R, WorkFailure>` so the engine's accounting never unwinds.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::{self, BoxFuture, FutureExt};

use crate::error::WorkFailure;

/// A started unit of work
pub(crate) type UnitFuture<R> = BoxFuture<'static, Result<R, WorkFailure>>;

/// Type-erased action shared by every unit of a queue or batch
pub(crate) type Action<T, R> = dyn Fn(T) -> UnitFuture<R> + Send + Sync;

/// Erase a caller-supplied action into an [`Action`]
pub(crate) fn erase<T, R, E, F, Fut>(action: F) -> Box<Action<T, R>>
where
    T: 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
    R: Send + 'static,
{
    Box::new(move |item| invoke(&action, item))
}

/// Call `action(item)` and wrap the returned future with panic isolation
pub(crate) fn invoke<T, R, E, F, Fut>(action: &F, item: T) -> UnitFuture<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
    R: Send + 'static,
{
    match std::panic::catch_unwind(AssertUnwindSafe(|| action(item))) {
        Ok(fut) => AssertUnwindSafe(fut)
            .catch_unwind()
            .map(|outcome| match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(WorkFailure::new(error)),
                Err(panic) => Err(WorkFailure::from_panic(panic)),
            })
            .boxed(),
        Err(panic) => future::ready(Err(WorkFailure::from_panic(panic))).boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        let action = |n: u32| async move { Ok::<_, anyhow::Error>(n * 2) };
        assert_eq!(invoke(&action, 21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_returned_error_becomes_failure() {
        let action = |_: ()| async { Err::<(), _>(anyhow::anyhow!("nope")) };
        let failure = invoke(&action, ()).await.unwrap_err();
        assert_eq!(failure.to_string(), "nope");
        assert!(!failure.is_panic());
    }

    #[tokio::test]
    async fn test_synchronous_panic_is_caught() {
        let action = |_: ()| -> futures::future::Ready<anyhow::Result<()>> {
            panic!("thrown before any future exists")
        };
        let failure = invoke(&action, ()).await.unwrap_err();
        assert!(failure.is_panic());
        assert!(failure.to_string().contains("thrown before"));
    }

    #[tokio::test]
    async fn test_panic_while_polling_is_caught() {
        let action = |_: ()| async {
            tokio::task::yield_now().await;
            if true {
                panic!("thrown mid-flight");
            }
            Ok::<(), anyhow::Error>(())
        };
        let failure = invoke(&action, ()).await.unwrap_err();
        assert!(failure.is_panic());
    }

    #[tokio::test]
    async fn test_erased_action() {
        let action = erase(|s: &'static str| async move { Ok::<_, std::io::Error>(s.len()) });
        assert_eq!(action("hello").await.unwrap(), 5);
    }
}
