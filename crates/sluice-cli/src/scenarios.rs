//! Demonstration scenarios run by the console harness

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use colored::Color;
use sluice_core::{HarnessConfig, JobQueue, SendReceiveCounter, SluiceError, map, times};

use crate::args::Commands;
use crate::console::{CLIConsole, StopClock};

const PHRASES: [&str; 4] = ["Hello", "Hello world", "How are you", "I'm doing fine"];

/// Index of the unit that fails in the `times` scenario
const FAULTY_INDEX: usize = 15;

/// Job that fails in the `queue` scenario
const FAULTY_JOB: usize = 7;

/// Spread-out delay below `max_ms` derived from an index
fn jitter(index: usize, max_ms: u64) -> Duration {
    Duration::from_millis((index as u64).wrapping_mul(2_654_435_761) % max_ms)
}

pub async fn run(command: Commands, config: &HarnessConfig, console: &CLIConsole) -> anyhow::Result<()> {
    match command {
        Commands::Map => run_map(config, console).await,
        Commands::Times => run_times(config, console).await,
        Commands::Queue => run_queue(config, console).await,
        Commands::All => {
            run_map(config, console).await?;
            run_times(config, console).await?;
            run_queue(config, console).await
        }
    }
}

async fn run_map(config: &HarnessConfig, console: &CLIConsole) -> anyhow::Result<()> {
    let _clock = StopClock::start("map", Color::Yellow);
    console.print_header(&format!(
        "Mapping {} phrases to their lengths, {} at a time",
        config.map_len, config.map_limit
    ));

    let source: Vec<String> = (0..config.map_len)
        .map(|i| PHRASES[i % PHRASES.len()].to_string())
        .collect();

    let lengths = map(source.iter().cloned().enumerate(), config.map_limit, |(index, text)| async move {
        tokio::time::sleep(jitter(index, 20)).await;
        Ok::<_, anyhow::Error>(text.len())
    })?
    .await?;

    for (index, (text, len)) in source.iter().zip(&lengths).enumerate() {
        if text.len() != *len {
            bail!("map result {index} is {len}, expected {}", text.len());
        }
    }
    console.success(&format!("{} lengths in source order", lengths.len()));
    Ok(())
}

async fn run_times(config: &HarnessConfig, console: &CLIConsole) -> anyhow::Result<()> {
    let _clock = StopClock::start("times", Color::Green);
    console.print_header(&format!(
        "Running {} indexed units, {} at a time, index {FAULTY_INDEX} fails",
        config.times_count, config.times_limit
    ));

    let counter = Arc::new(SendReceiveCounter::new());
    let c = counter.clone();
    let result = times(config.times_count, config.times_limit, move |index| {
        let counter = c.clone();
        counter.increment_sent();
        async move {
            tokio::task::yield_now().await;
            counter.increment_received();
            if index == FAULTY_INDEX {
                bail!("Test exception");
            }
            Ok(())
        }
    })?
    .await;

    console.info(&format!(
        "started {}, finished {}",
        counter.sent(),
        counter.received()
    ));

    match result {
        Err(SluiceError::Aggregate(aggregate)) if config.times_count > FAULTY_INDEX => {
            console.success(&format!(
                "batch failed as expected at index {}: {}",
                aggregate.primary_index(),
                aggregate.primary()
            ));
            Ok(())
        }
        Ok(()) if config.times_count <= FAULTY_INDEX => {
            console.success("batch completed");
            Ok(())
        }
        other => bail!("unexpected times outcome: {other:?}"),
    }
}

async fn run_queue(config: &HarnessConfig, console: &CLIConsole) -> anyhow::Result<()> {
    let _clock = StopClock::start("queue", Color::Cyan);
    console.print_header(&format!(
        "Pushing {} jobs through '{}', {} at a time, job {FAULTY_JOB} fails",
        config.queue_jobs, config.queue.name, config.queue.limit
    ));

    let queue = JobQueue::with_config(config.queue.clone(), |job: usize| async move {
        tokio::time::sleep(jitter(job, 10)).await;
        if job == FAULTY_JOB {
            bail!("job {job} failed");
        }
        Ok(())
    })?;

    let drained = Arc::new(AtomicUsize::new(0));
    let d = drained.clone();
    queue.on_drained(move |at| {
        d.fetch_add(1, Ordering::SeqCst);
        tracing::info!(%at, "queue drained");
    });
    let unhandled = Arc::new(AtomicUsize::new(0));
    let u = unhandled.clone();
    queue.on_unhandled_error(move |failure| {
        u.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(error = %failure, "unhandled job failure");
    });

    let handles = (0..config.queue_jobs)
        .map(|job| queue.enqueue(job))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to enqueue")?;

    let mut failed = 0;
    for handle in handles {
        if let Err(error) = handle.await {
            console.warn(&format!("{error}"));
            failed += 1;
        }
    }

    if queue.count() != 0 {
        bail!("queue still reports {} outstanding jobs", queue.count());
    }
    console.success(&format!(
        "{} jobs settled, {failed} failed, {} unhandled error notifications, drained {} time(s)",
        config.queue_jobs,
        unhandled.load(Ordering::SeqCst),
        drained.load(Ordering::SeqCst)
    ));
    queue.dispose();
    Ok(())
}
