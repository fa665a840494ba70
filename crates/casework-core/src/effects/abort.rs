//! Cooperative abort tokens for in-flight requests.
//!
//! An [`AbortController`] owns the right to cancel; every [`AbortSignal`]
//! cloned from it observes that cancellation. Cancellation never interrupts a
//! future by force: holders either race their work against
//! [`AbortSignal::cancelled`] or check [`AbortSignal::is_aborted`] when the
//! work settles and discard the result.

use std::future::Future;

use tokio::sync::watch;

/// Owner side of an abort token.
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

impl AbortController {
    /// Create a controller that has not been aborted.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Signal observing this controller.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Abort every signal derived from this controller. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of an abort token, attached to a single request.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that can never be aborted.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Non-blocking cancellation check.
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the owning controller aborts.
    ///
    /// Stays pending forever if the controller is dropped without aborting.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Race `fut` against cancellation.
    ///
    /// Returns `None` if the signal aborted first; the future is dropped.
    pub async fn run<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        if self.is_aborted() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_is_observed_by_all_signals() {
        let controller = AbortController::new();
        let a = controller.signal();
        let b = a.clone();
        assert!(!a.is_aborted());

        controller.abort();
        assert!(a.is_aborted());
        assert!(b.is_aborted());
        assert!(controller.is_aborted());
    }

    #[test]
    fn test_never_signal() {
        assert!(!AbortSignal::never().is_aborted());
    }

    #[tokio::test]
    async fn test_run_returns_output_when_not_aborted() {
        let controller = AbortController::new();
        let out = controller.signal().run(async { 7 }).await;
        assert_eq!(out, Some(7));
    }

    #[tokio::test]
    async fn test_run_short_circuits_after_abort() {
        let controller = AbortController::new();
        let signal = controller.signal();
        controller.abort();
        let out = signal.run(async { 7 }).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn test_cancelled_wakes_pending_work() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let pending = signal.run(std::future::pending::<()>());
        let (out, ()) = tokio::join!(pending, async { controller.abort() });
        assert_eq!(out, None);
    }
}
