//! End-to-end scenarios through the public `sluice` API

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use sluice::{JobQueue, SluiceError, create_queue, map, times};
use tokio::sync::oneshot;

/// Let spawned jobs observe a release
async fn settle_briefly() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn queue_admits_limit_jobs_and_one_more_per_release() {
    let started = Arc::new(AtomicUsize::new(0));
    let drained = Arc::new(AtomicUsize::new(0));

    let s = started.clone();
    let queue = create_queue(10, move |release: oneshot::Receiver<()>| {
        s.fetch_add(1, Ordering::SeqCst);
        release
    })
    .unwrap();
    let d = drained.clone();
    queue.on_drained(move |_| {
        d.fetch_add(1, Ordering::SeqCst);
    });

    let mut releases = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..50 {
        let (tx, rx) = oneshot::channel();
        releases.push(tx);
        handles.push(queue.enqueue(rx).unwrap());
    }

    assert_eq!(started.load(Ordering::SeqCst), 10);
    assert_eq!(queue.count(), 50);

    for (k, release) in releases.into_iter().enumerate() {
        release.send(()).unwrap();
        settle_briefly().await;
        assert_eq!(started.load(Ordering::SeqCst), (11 + k).min(50));
        assert_eq!(queue.count(), 49 - k as u64);
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(drained.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn queue_failure_stays_with_its_own_handle() {
    let queue = JobQueue::new(4, |index: usize| async move {
        tokio::task::yield_now().await;
        if index == 5 {
            anyhow::bail!("job {index} failed");
        }
        Ok(())
    })
    .unwrap();

    let unhandled = Arc::new(AtomicUsize::new(0));
    let u = unhandled.clone();
    queue.on_unhandled_error(move |_| {
        u.fetch_add(1, Ordering::SeqCst);
    });

    let handles: Vec<_> = (0..10).map(|i| queue.enqueue(i).unwrap()).collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await);
    }

    let failed: Vec<_> = outcomes
        .iter()
        .enumerate()
        .filter(|(_, outcome)| outcome.is_err())
        .map(|(index, _)| index)
        .collect();
    assert_eq!(failed, vec![5]);
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 9);
    assert_eq!(unhandled.load(Ordering::SeqCst), 1);
    assert_eq!(queue.count(), 0);
}

#[tokio::test]
async fn times_passes_every_index_once() {
    let indexes = Arc::new(Mutex::new(vec![None; 1000]));
    let i = indexes.clone();
    times(1000, 10, move |index| {
        i.lock()[index] = Some(index);
        async { Ok::<_, anyhow::Error>(()) }
    })
    .unwrap()
    .await
    .unwrap();

    for (i, seen) in indexes.lock().iter().enumerate() {
        assert_eq!(*seen, Some(i));
    }
}

#[tokio::test]
async fn times_fails_with_the_underlying_cause() {
    let result = times(100, 10, |index| async move {
        if index == 15 {
            anyhow::bail!("Test exception");
        }
        Ok(())
    })
    .unwrap()
    .await;

    let error = result.unwrap_err();
    assert!(matches!(error, SluiceError::Aggregate(_)));
    assert_eq!(error.work_failure().unwrap().to_string(), "Test exception");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn map_returns_lengths_in_source_order() {
    let phrases = ["Hello", "Hello world", "How are you", "I'm doing fine"];
    let source: Vec<String> = (0..100).map(|i| phrases[i % phrases.len()].to_string()).collect();

    let lengths = map(source.iter().cloned().enumerate(), 7, |(i, text)| async move {
        let delay = (i as u64 * 7919) % 15;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok::<_, anyhow::Error>(text.len())
    })
    .unwrap()
    .await
    .unwrap();

    assert_eq!(lengths.len(), 100);
    for (text, len) in source.iter().zip(lengths) {
        assert_eq!(text.len(), len);
    }
}
