//! Fair asynchronous mutual exclusion over the single connection.
//!
//! [`ConnectionGate`] is a one-permit [`Semaphore`] with no guard object:
//! `acquire` resolves once the caller holds the gate and `release` gives it
//! up. The semaphore queues waiters strictly FIFO, so a caller arriving later
//! can never overtake one that is already queued.

use asupersync::Cx;
use asupersync::sync::{AcquireError, Semaphore};
use std::sync::atomic::{AtomicBool, Ordering};

/// FIFO, asynchronous-acquire mutual exclusion.
///
/// Acquiring twice from the same task without releasing deadlocks.
#[derive(Debug)]
pub struct ConnectionGate {
    permits: Semaphore,
    /// Set once an acquirer has taken the permit, cleared by `release`.
    held: AtomicBool,
}

impl Default for ConnectionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionGate {
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(1),
            held: AtomicBool::new(false),
        }
    }

    /// Wait until the caller holds the gate.
    ///
    /// Dropping the future while queued leaves the queue; if the gate was
    /// already released to it, the next waiter is woken instead.
    pub async fn acquire(&self, cx: &Cx) -> Result<(), AcquireError> {
        let permit = self.permits.acquire(cx, 1).await?;
        // The permit is returned by `release`, not by a guard.
        permit.forget();
        self.held.store(true, Ordering::Release);
        Ok(())
    }

    /// Give up the gate, admitting the oldest waiter.
    ///
    /// Returns `false` without changing anything if the gate was not held,
    /// so an unmatched release can never admit two callers at once.
    pub fn release(&self) -> bool {
        if !self.held.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.permits.add_permits(1);
        tracing::trace!(closed = self.permits.is_closed(), "gate released");
        true
    }

    /// Fail every queued and future acquirer with [`AcquireError::Closed`].
    pub fn close(&self) {
        self.permits.close();
    }

    /// Is someone currently holding the gate?
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::task::{Context, Poll, Wake, Waker};

    fn poll_once<F: Future + ?Sized>(fut: Pin<&mut F>) -> Poll<F::Output> {
        let mut cx = Context::from_waker(Waker::noop());
        fut.poll(&mut cx)
    }

    fn is_admitted<F: Future<Output = Result<(), AcquireError>> + ?Sized>(
        fut: Pin<&mut F>,
    ) -> bool {
        match poll_once(fut) {
            Poll::Ready(Ok(())) => true,
            Poll::Ready(Err(e)) => panic!("acquire failed: {e}"),
            Poll::Pending => false,
        }
    }

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_uncontended_acquire_is_immediate() {
        let cx = Cx::for_testing();
        let gate = ConnectionGate::new();
        let mut a = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(a.as_mut()));
        assert!(gate.is_held());
        assert!(gate.release());
        assert!(!gate.is_held());
    }

    #[test]
    fn test_release_when_open_is_rejected() {
        let gate = ConnectionGate::new();
        assert!(!gate.release());
        assert!(!gate.is_held());
    }

    #[test]
    fn test_waiters_admitted_in_fifo_order() {
        let cx = Cx::for_testing();
        let gate = ConnectionGate::new();
        let mut holder = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(holder.as_mut()));

        let mut waiters: Vec<_> = (0..5).map(|_| Box::pin(gate.acquire(&cx))).collect();
        for w in &mut waiters {
            assert!(!is_admitted(w.as_mut()));
        }

        for i in 0..5 {
            assert!(gate.release());
            // Only the oldest remaining waiter becomes ready.
            for (j, w) in waiters.iter_mut().enumerate().skip(i) {
                let ready = is_admitted(w.as_mut());
                assert_eq!(ready, j == i, "waiter {j} after release {i}");
            }
            assert!(gate.is_held());
        }

        assert!(gate.release());
        assert!(!gate.is_held());
    }

    #[test]
    fn test_newcomer_cannot_barge_past_queue() {
        let cx = Cx::for_testing();
        let gate = ConnectionGate::new();
        let mut holder = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(holder.as_mut()));

        let mut queued = Box::pin(gate.acquire(&cx));
        assert!(!is_admitted(queued.as_mut()));

        assert!(gate.release());
        let mut newcomer = Box::pin(gate.acquire(&cx));
        assert!(!is_admitted(newcomer.as_mut()));
        assert!(is_admitted(queued.as_mut()));

        assert!(gate.release());
        assert!(is_admitted(newcomer.as_mut()));
    }

    #[test]
    fn test_double_release_does_not_lose_a_waiter() {
        let cx = Cx::for_testing();
        let gate = ConnectionGate::new();
        let mut holder = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(holder.as_mut()));

        let mut a = Box::pin(gate.acquire(&cx));
        let mut b = Box::pin(gate.acquire(&cx));
        assert!(!is_admitted(a.as_mut()));
        assert!(!is_admitted(b.as_mut()));

        assert!(gate.release());
        // `a` has been released to but has not run yet.
        assert!(!gate.release());

        assert!(!is_admitted(b.as_mut()));
        assert!(is_admitted(a.as_mut()));
        assert!(!is_admitted(b.as_mut()), "only one holder at a time");

        assert!(gate.release());
        assert!(is_admitted(b.as_mut()));
        assert!(gate.release());
        assert!(!gate.is_held());
    }

    #[test]
    fn test_release_wakes_exactly_the_next_waiter() {
        let cx = Cx::for_testing();
        let gate = ConnectionGate::new();
        let mut holder = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(holder.as_mut()));

        let first = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let second = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let first_waker = Waker::from(Arc::clone(&first));
        let second_waker = Waker::from(Arc::clone(&second));

        let mut a = Box::pin(gate.acquire(&cx));
        let mut b = Box::pin(gate.acquire(&cx));
        assert!(a.as_mut().poll(&mut Context::from_waker(&first_waker)).is_pending());
        assert!(b.as_mut().poll(&mut Context::from_waker(&second_waker)).is_pending());

        assert!(gate.release());
        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        assert_eq!(second.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropped_waiter_leaves_queue() {
        let cx = Cx::for_testing();
        let gate = ConnectionGate::new();
        let mut holder = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(holder.as_mut()));

        let mut a = Box::pin(gate.acquire(&cx));
        let mut b = Box::pin(gate.acquire(&cx));
        assert!(!is_admitted(a.as_mut()));
        assert!(!is_admitted(b.as_mut()));
        drop(a);

        assert!(gate.release());
        assert!(is_admitted(b.as_mut()));
    }

    #[test]
    fn test_dropped_waiter_after_release_passes_gate_on() {
        let cx = Cx::for_testing();
        let gate = ConnectionGate::new();
        let mut holder = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(holder.as_mut()));

        let mut a = Box::pin(gate.acquire(&cx));
        let mut b = Box::pin(gate.acquire(&cx));
        assert!(!is_admitted(a.as_mut()));
        assert!(!is_admitted(b.as_mut()));

        // `a` is released to but never runs.
        assert!(gate.release());
        drop(a);
        assert!(is_admitted(b.as_mut()));

        assert!(gate.release());
        assert!(!gate.is_held());
    }

    #[test]
    fn test_dropped_last_waiter_opens_gate() {
        let cx = Cx::for_testing();
        let gate = ConnectionGate::new();
        let mut holder = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(holder.as_mut()));

        let mut a = Box::pin(gate.acquire(&cx));
        assert!(!is_admitted(a.as_mut()));
        assert!(gate.release());
        drop(a);

        assert!(!gate.is_held());
        let mut c = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(c.as_mut()));
    }

    #[test]
    fn test_close_fails_queued_and_later_acquirers() {
        let cx = Cx::for_testing();
        let gate = ConnectionGate::new();
        let mut holder = Box::pin(gate.acquire(&cx));
        assert!(is_admitted(holder.as_mut()));

        let mut queued = Box::pin(gate.acquire(&cx));
        assert!(!is_admitted(queued.as_mut()));

        gate.close();
        assert!(gate.is_closed());
        assert!(matches!(
            poll_once(queued.as_mut()),
            Poll::Ready(Err(AcquireError::Closed))
        ));

        // The holder can still give the gate up, but nobody is admitted again.
        assert!(gate.release());
        assert!(!gate.is_held());
        let mut late = Box::pin(gate.acquire(&cx));
        assert!(matches!(
            poll_once(late.as_mut()),
            Poll::Ready(Err(AcquireError::Closed))
        ));
    }

    #[test]
    fn test_cancelled_context_does_not_acquire() {
        let cx = Cx::for_testing();
        cx.cancel_with(asupersync::CancelKind::User, None);
        let gate = ConnectionGate::new();
        let mut a = Box::pin(gate.acquire(&cx));
        assert!(matches!(
            poll_once(a.as_mut()),
            Poll::Ready(Err(AcquireError::Cancelled))
        ));
        assert!(!gate.is_held());
    }
}
