//! Sluice: bounded-concurrency execution primitives for Tokio
//!
//! This crate re-exports [`sluice_core`]; see its documentation for the
//! admission gate, the job queue and the `times`/`map` batches.

pub use sluice_core::*;
