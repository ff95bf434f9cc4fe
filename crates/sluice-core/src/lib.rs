//! Sluice core library
//!
//! Bounded-concurrency execution primitives for Tokio:
//! - [`AdmissionGate`]: a FIFO counting gate handing out permits in request order
//! - [`JobQueue`]: a long-lived queue running submitted items through one action,
//!   at most `limit` at a time, with drain and unhandled-error notifications
//! - [`times`] and [`map`]: fixed-size batches with a concurrency ceiling whose
//!   handle settles once every unit has settled
//! - [`SendReceiveCounter`]: a pair of thread-safe diagnostic counters
//!
//! Every failure of a unit of work is captured, including panics, and reported
//! through the handle of the operation that started it.

pub mod batch;
pub mod config;
pub mod counter;
pub mod error;
pub mod ext;
pub mod gate;
pub mod queue;

mod unit;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use batch::{BatchHandle, map, times};
pub use config::{HarnessConfig, QueueConfig, load_from_file};
pub use counter::SendReceiveCounter;
pub use error::{AggregateFailure, PanicError, SluiceError, SluiceResult, WorkFailure};
pub use ext::{fire_and_forget, throttle, with_cancellation, with_timeout};
pub use gate::{AdmissionGate, GateError, Permit, Ticket};
pub use queue::{JobHandle, JobQueue, ObserverId, QueueEvent, create_queue};
