//! Admission gate: a counting gate with strict FIFO hand-off
//!
//! A permit is reserved synchronously (`reserve`) so the admission position is fixed
//! at call time, then awaited through the returned [`Ticket`]. Releasing a permit
//! (dropping [`Permit`]) hands it straight to the oldest live waiter instead of
//! returning it to the pool, which keeps admission in arrival order.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::error::{SluiceError, SluiceResult};

/// Errors produced by the gate itself
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// The gate was disposed before a permit could be granted
    #[error("admission gate disposed")]
    Disposed,
}

impl From<GateError> for SluiceError {
    fn from(_: GateError) -> Self {
        SluiceError::Disposed
    }
}

#[derive(Debug)]
struct GateState {
    available: usize,
    waiters: VecDeque<oneshot::Sender<Permit>>,
    disposed: bool,
}

#[derive(Debug)]
struct GateInner {
    capacity: usize,
    state: Mutex<GateState>,
}

/// Counting admission gate with FIFO wake order
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    inner: Arc<GateInner>,
}

impl AdmissionGate {
    /// Create a gate with `capacity` permits
    pub fn new(capacity: usize) -> SluiceResult<Self> {
        if capacity == 0 {
            return Err(SluiceError::InvalidLimit { limit: capacity });
        }
        Ok(Self {
            inner: Arc::new(GateInner {
                capacity,
                state: Mutex::new(GateState {
                    available: capacity,
                    waiters: VecDeque::new(),
                    disposed: false,
                }),
            }),
        })
    }

    /// Reserve the next admission slot.
    ///
    /// Takes a permit right away when one is free and nobody is queued ahead,
    /// otherwise enqueues the caller behind every earlier reservation.
    pub fn reserve(&self) -> Result<Ticket, GateError> {
        let mut state = self.inner.state.lock();
        if state.disposed {
            return Err(GateError::Disposed);
        }
        if state.available > 0 && state.waiters.is_empty() {
            state.available -= 1;
            drop(state);
            return Ok(Ticket {
                state: TicketState::Ready(Some(self.permit())),
            });
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(tx);
        tracing::trace!(waiting = state.waiters.len(), "queued for admission");
        Ok(Ticket {
            state: TicketState::Waiting(rx),
        })
    }

    /// Wait for a permit
    pub async fn acquire(&self) -> Result<Permit, GateError> {
        self.reserve()?.await
    }

    /// Take a permit only if one is free right now and nobody is waiting
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut state = self.inner.state.lock();
        if state.disposed || state.available == 0 || !state.waiters.is_empty() {
            return None;
        }
        state.available -= 1;
        drop(state);
        Some(self.permit())
    }

    /// Mark the gate unusable and fail every pending reservation.
    ///
    /// Permits already handed out stay valid; releasing them later is a no-op.
    pub fn dispose(&self) {
        let waiters = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.waiters)
        };
        // Dropping the senders resolves every ticket with `Disposed`.
        let abandoned = waiters.len();
        drop(waiters);
        tracing::debug!(abandoned, "admission gate disposed");
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Permits neither held nor promised to a waiter
    pub fn available(&self) -> usize {
        self.inner.state.lock().available
    }

    /// Number of reservations still waiting for a permit
    pub fn waiting(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    fn permit(&self) -> Permit {
        Permit {
            gate: Some(Arc::clone(&self.inner)),
        }
    }
}

impl GateInner {
    fn release(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        while let Some(waiter) = state.waiters.pop_front() {
            let permit = Permit {
                gate: Some(Arc::clone(self)),
            };
            match waiter.send(permit) {
                Ok(()) => {
                    tracing::trace!(waiting = state.waiters.len(), "permit handed off");
                    return;
                }
                Err(mut returned) => {
                    // Ticket was dropped; the permit goes to the next in line.
                    returned.gate = None;
                }
            }
        }
        state.available += 1;
        debug_assert!(state.available <= self.capacity);
    }
}

/// RAII admission permit; dropping it releases the permit
#[derive(Debug)]
pub struct Permit {
    gate: Option<Arc<GateInner>>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.release();
        }
    }
}

#[derive(Debug)]
enum TicketState {
    Ready(Option<Permit>),
    Waiting(oneshot::Receiver<Permit>),
}

/// A reserved admission position.
///
/// Resolves to a [`Permit`] once every earlier reservation has been served.
/// Dropping an unresolved ticket gives up the position.
#[derive(Debug)]
#[must_use = "a ticket holds an admission position until awaited or dropped"]
pub struct Ticket {
    state: TicketState,
}

impl Ticket {
    /// Whether the permit was granted at reservation time
    pub fn is_ready(&self) -> bool {
        matches!(self.state, TicketState::Ready(Some(_)))
    }

    /// Take the permit if it was granted at reservation time
    pub fn try_take(&mut self) -> Option<Permit> {
        match &mut self.state {
            TicketState::Ready(permit) => permit.take(),
            TicketState::Waiting(_) => None,
        }
    }
}

impl Future for Ticket {
    type Output = Result<Permit, GateError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            TicketState::Ready(permit) => Poll::Ready(permit.take().ok_or(GateError::Disposed)),
            TicketState::Waiting(rx) => Pin::new(rx).poll(cx).map_err(|_| GateError::Disposed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_zero_capacity_rejected() {
        let result = AdmissionGate::new(0);
        assert!(matches!(result, Err(SluiceError::InvalidLimit { limit: 0 })));
    }

    #[test]
    fn test_permits_are_counted() {
        let gate = AdmissionGate::new(2).unwrap();
        let a = gate.try_acquire().unwrap();
        let b = gate.try_acquire().unwrap();
        assert_eq!(gate.available(), 0);
        assert!(gate.try_acquire().is_none());

        drop(a);
        assert_eq!(gate.available(), 1);
        drop(b);
        assert_eq!(gate.available(), 2);
    }

    #[test]
    fn test_waiters_woken_in_fifo_order() {
        let gate = AdmissionGate::new(1).unwrap();
        let held = gate.try_acquire().unwrap();

        let mut first = task::spawn(gate.reserve().unwrap());
        let mut second = task::spawn(gate.reserve().unwrap());
        let mut third = task::spawn(gate.reserve().unwrap());
        assert_pending!(first.poll());
        assert_pending!(second.poll());
        assert_pending!(third.poll());
        assert_eq!(gate.waiting(), 3);

        drop(held);
        assert!(first.is_woken());
        assert_pending!(second.poll());
        let permit = assert_ready!(first.poll()).unwrap();
        assert_eq!(gate.available(), 0);

        drop(permit);
        assert_pending!(third.poll());
        let permit = assert_ready!(second.poll()).unwrap();
        drop(permit);
        let permit = assert_ready!(third.poll()).unwrap();
        drop(permit);
        assert_eq!(gate.available(), 1);
    }

    #[test]
    fn test_reservation_cannot_jump_the_queue() {
        let gate = AdmissionGate::new(1).unwrap();
        let held = gate.try_acquire().unwrap();
        let waiting = gate.reserve().unwrap();
        assert!(!waiting.is_ready());

        drop(held);
        // The freed permit belongs to the waiter, not to newcomers.
        assert!(gate.try_acquire().is_none());
        let late = gate.reserve().unwrap();
        assert!(!late.is_ready());
        drop(waiting);
        drop(late);
    }

    #[test]
    fn test_dropped_ticket_passes_permit_on() {
        let gate = AdmissionGate::new(1).unwrap();
        let held = gate.try_acquire().unwrap();
        let abandoned = gate.reserve().unwrap();
        let mut next = task::spawn(gate.reserve().unwrap());
        assert_pending!(next.poll());

        drop(abandoned);
        drop(held);
        let permit = assert_ready!(next.poll()).unwrap();
        drop(permit);
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.waiting(), 0);
    }

    #[test]
    fn test_dispose_fails_pending_and_future_reservations() {
        let gate = AdmissionGate::new(1).unwrap();
        let held = gate.try_acquire().unwrap();
        let mut pending = task::spawn(gate.reserve().unwrap());
        assert_pending!(pending.poll());

        gate.dispose();
        assert!(gate.is_disposed());
        assert_eq!(assert_ready!(pending.poll()).unwrap_err(), GateError::Disposed);
        assert_eq!(gate.reserve().unwrap_err(), GateError::Disposed);
        assert!(gate.try_acquire().is_none());

        // Releasing after disposal is a silent no-op.
        drop(held);
        gate.dispose();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_acquire_bounds_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let gate = AdmissionGate::new(3).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let gate = gate.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.available(), 3);
    }
}
