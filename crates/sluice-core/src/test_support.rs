//! Externally completed futures for driving engine tests step by step

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

type Outcome = Result<(), String>;

/// One externally settled completion per index
pub(crate) struct Completions {
    senders: Mutex<Vec<Option<oneshot::Sender<Outcome>>>>,
    receivers: Mutex<Vec<Option<oneshot::Receiver<Outcome>>>>,
}

impl Completions {
    pub(crate) fn new(len: usize) -> Arc<Self> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..len).map(|_| oneshot::channel()).unzip();
        Arc::new(Self {
            senders: Mutex::new(senders.into_iter().map(Some).collect()),
            receivers: Mutex::new(receivers.into_iter().map(Some).collect()),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.lock().len()
    }

    /// Future settling when `complete(index)` or `fail(index, ..)` is called
    pub(crate) fn wait(&self, index: usize) -> impl Future<Output = anyhow::Result<()>> + Send + use<> {
        let rx = self.receivers.lock()[index].take();
        async move {
            let rx = rx.ok_or_else(|| anyhow!("completion {index} awaited twice"))?;
            match rx.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(message)) => Err(anyhow!(message)),
                Err(_) => Err(anyhow!("completion {index} dropped")),
            }
        }
    }

    pub(crate) fn complete(&self, index: usize) {
        if let Some(tx) = self.senders.lock()[index].take() {
            let _ = tx.send(Ok(()));
        }
    }

    pub(crate) fn fail(&self, index: usize, message: &str) {
        if let Some(tx) = self.senders.lock()[index].take() {
            let _ = tx.send(Err(message.to_string()));
        }
    }
}

/// A single completion any number of units can wait on
#[derive(Clone)]
pub(crate) struct Latch {
    tx: Arc<watch::Sender<Option<Outcome>>>,
}

impl Latch {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub(crate) fn wait(&self) -> impl Future<Output = anyhow::Result<()>> + Send + use<> {
        let mut rx = self.tx.subscribe();
        async move {
            let outcome = {
                let value = rx
                    .wait_for(|v| v.is_some())
                    .await
                    .map_err(|_| anyhow!("latch dropped"))?;
                value.clone()
            };
            match outcome {
                Some(Err(message)) => Err(anyhow!(message)),
                _ => Ok(()),
            }
        }
    }

    pub(crate) fn open(&self) {
        self.tx.send_replace(Some(Ok(())));
    }

    pub(crate) fn fail(&self, message: &str) {
        self.tx.send_replace(Some(Err(message.to_string())));
    }
}

/// Give spawned units time to observe a completion
pub(crate) async fn settle_briefly() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
