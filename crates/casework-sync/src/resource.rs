//! Fetch state for one remote resource.
//!
//! A [`Resource`] pairs three observable cells (`data`, `loading`, `error`)
//! with a [`RequestSlot`]. Only the request holding the slot's current ticket
//! may write them; superseded requests settle silently, and aborts are never
//! recorded as errors.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use casework_core::effects::AbortSignal;
use casework_core::errors::{CaseworkError, Result};
use casework_core::reactive::{Dynamic, Subscription};

use crate::mutation::Reconciled;
use crate::slot::{RequestSlot, ResourceKey};

/// How a fetch settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response was current and is now visible
    Landed,
    /// The request failed and the error is now visible
    Failed,
    /// A newer request or a cancellation took over; nothing changed
    Superseded,
    /// No request was issued
    Skipped,
}

/// Observable fetch state behind a request slot.
pub struct Resource<T> {
    data: Dynamic<Option<T>>,
    loading: Dynamic<bool>,
    error: Dynamic<Option<CaseworkError>>,
    slot: Arc<RequestSlot>,
    reconcile_generation: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> Resource<T> {
    /// Resource with its own slot.
    pub fn new(name: &str) -> Self {
        Self::with_slot(Arc::new(RequestSlot::new(name)))
    }

    /// Resource sharing a slot, e.g. one handed out by an
    /// [`AbortCoordinator`](crate::slot::AbortCoordinator).
    pub fn with_slot(slot: Arc<RequestSlot>) -> Self {
        Self {
            data: Dynamic::new(None),
            loading: Dynamic::new(false),
            error: Dynamic::new(None),
            slot,
            reconcile_generation: AtomicU64::new(0),
        }
    }

    /// Run `loader` as the slot's newest request and publish its result if
    /// it is still current when it settles.
    pub async fn load<F, Fut>(&self, key: ResourceKey, loader: F) -> FetchOutcome
    where
        F: FnOnce(AbortSignal) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ticket = self.slot.begin(key);
        self.loading.set_if_changed(true);
        self.error.set_if_changed(None);

        let result = loader(ticket.signal().clone()).await;

        if !self.slot.finish(&ticket) {
            tracing::debug!(
                slot = %self.slot.name(),
                generation = ticket.generation(),
                "discarding superseded response"
            );
            self.settle_orphaned();
            return FetchOutcome::Superseded;
        }

        self.loading.set_if_changed(false);
        match result {
            Ok(value) => {
                self.data.set(Some(value));
                FetchOutcome::Landed
            }
            Err(err) if err.is_cancellation() => FetchOutcome::Superseded,
            Err(err) => {
                tracing::warn!(slot = %self.slot.name(), error = %err, "fetch failed");
                self.error.set(Some(err));
                FetchOutcome::Failed
            }
        }
    }

    /// Fetch the authoritative value through the slot without publishing it.
    ///
    /// Used to reconcile mutations: the caller decides whether the value may
    /// still be written. When a newer request on the slot takes over, that
    /// request publishes instead and the result is [`Reconciled::HandedOff`].
    /// A plain cancellation yields `Cancelled`.
    pub async fn reconcile<F, Fut>(&self, key: ResourceKey, loader: F) -> Result<Reconciled<T>>
    where
        F: FnOnce(AbortSignal) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ticket = self.slot.begin(key);
        self.reconcile_generation
            .store(ticket.generation(), Ordering::SeqCst);
        self.loading.set_if_changed(true);

        let result = loader(ticket.signal().clone()).await;

        if !self.slot.finish(&ticket) {
            self.settle_orphaned();
            if self.slot.generation() > ticket.generation() {
                tracing::debug!(
                    slot = %self.slot.name(),
                    generation = ticket.generation(),
                    "reconcile handed off to a newer request"
                );
                return Ok(Reconciled::HandedOff);
            }
            return Err(CaseworkError::Cancelled);
        }
        self.loading.set_if_changed(false);
        if result.is_ok() {
            self.error.set_if_changed(None);
        }
        result.map(Reconciled::Value)
    }

    /// A cancelled request leaves no successor to clear the loading flag.
    fn settle_orphaned(&self) {
        if !self.slot.in_flight() {
            self.loading.set_if_changed(false);
        }
    }

    /// Abort an outstanding plain fetch before a mutation projects.
    ///
    /// A reconcile refetch still in flight is left running: its value is
    /// the server's answer to an accepted mutation.
    pub fn cancel_fetch(&self) {
        let reconciling = self.slot.in_flight()
            && self.slot.generation() == self.reconcile_generation.load(Ordering::SeqCst);
        if !reconciling {
            self.cancel();
        }
    }

    /// Abort the outstanding request. Loading stops; data is untouched.
    pub fn cancel(&self) {
        if self.slot.cancel() {
            self.loading.set_if_changed(false);
        }
    }

    // ─── State ───────────────────────────────────────────────

    /// Last published value.
    pub fn data(&self) -> Option<T> {
        self.data.get()
    }

    /// Shared data cell. Mutation engines write through it.
    pub fn data_cell(&self) -> &Dynamic<Option<T>> {
        &self.data
    }

    /// Whether a fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    /// Error from the last failed fetch.
    pub fn error(&self) -> Option<CaseworkError> {
        self.error.get()
    }

    /// Whether any value has been published.
    pub fn has_data(&self) -> bool {
        self.data.with(Option::is_some)
    }

    /// Subscribe to published values.
    pub fn subscribe(&self) -> Subscription<Option<T>> {
        self.data.subscribe()
    }

    /// Subscribe to the loading flag.
    pub fn subscribe_loading(&self) -> Subscription<bool> {
        self.loading.subscribe()
    }

    /// Subscribe to the error cell.
    pub fn subscribe_error(&self) -> Subscription<Option<CaseworkError>> {
        self.error.subscribe()
    }

    /// The slot issuing this resource's requests.
    pub fn slot(&self) -> &Arc<RequestSlot> {
        &self.slot
    }

    /// Forget loaded data and errors.
    pub fn clear(&self) {
        self.cancel();
        self.data.set(None);
        self.error.set_if_changed(None);
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("slot", &self.slot.name())
            .field("has_data", &self.has_data())
            .field("loading", &self.is_loading())
            .field("error", &self.error())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_landed_fetch_publishes() {
        let resource = Resource::<u32>::new("numbers");
        let outcome = resource.load(ResourceKey::new("a"), |_| async { Ok(7) }).await;
        assert_eq!(outcome, FetchOutcome::Landed);
        assert_eq!(resource.data(), Some(7));
        assert!(!resource.is_loading());
        assert_eq!(resource.error(), None);
    }

    #[tokio::test]
    async fn test_failure_is_stored() {
        let resource = Resource::<u32>::new("numbers");
        let outcome = resource
            .load(ResourceKey::new("a"), |_| async {
                Err(CaseworkError::network("offline"))
            })
            .await;
        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(resource.error(), Some(CaseworkError::network("offline")));
        assert_eq!(resource.data(), None);
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let resource = Resource::<&'static str>::new("review");
        let (release_a, wait_a) = oneshot::channel::<()>();

        let first = resource.load(ResourceKey::new("txn-1"), |_| async move {
            let _ = wait_a.await;
            Ok("A")
        });
        let second = async {
            tokio::task::yield_now().await;
            let outcome = resource
                .load(ResourceKey::new("txn-1"), |_| async { Ok("B") })
                .await;
            let _ = release_a.send(());
            outcome
        };

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, FetchOutcome::Superseded);
        assert_eq!(b, FetchOutcome::Landed);
        assert_eq!(resource.data(), Some("B"));
        assert!(!resource.is_loading());
    }

    #[tokio::test]
    async fn test_cancelled_result_is_not_an_error() {
        let resource = Resource::<u32>::new("numbers");
        let outcome = resource
            .load(ResourceKey::new("a"), |_| async { Err(CaseworkError::Cancelled) })
            .await;
        assert_eq!(outcome, FetchOutcome::Superseded);
        assert_eq!(resource.error(), None);
    }

    #[tokio::test]
    async fn test_reconcile_does_not_publish() {
        let resource = Resource::<u32>::new("numbers");
        let value = resource
            .reconcile(ResourceKey::new("a"), |_| async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(value, Reconciled::Value(3));
        assert_eq!(resource.data(), None);
    }

    #[tokio::test]
    async fn test_reconcile_hands_off_to_newer_fetch() {
        let resource = Resource::<u32>::new("numbers");
        let (release, wait) = oneshot::channel::<()>();

        let reconcile = resource.reconcile(ResourceKey::new("a"), |_| async move {
            let _ = wait.await;
            Ok(1)
        });
        let refresh = async {
            tokio::task::yield_now().await;
            let outcome = resource.load(ResourceKey::new("a"), |_| async { Ok(2) }).await;
            let _ = release.send(());
            outcome
        };

        let (reconciled, refreshed) = tokio::join!(reconcile, refresh);
        assert_eq!(reconciled.unwrap(), Reconciled::HandedOff);
        assert_eq!(refreshed, FetchOutcome::Landed);
        assert_eq!(resource.data(), Some(2));
    }

    #[tokio::test]
    async fn test_cancelled_reconcile_is_an_error() {
        let resource = Resource::<u32>::new("numbers");
        let (release, wait) = oneshot::channel::<()>();

        let reconcile = resource.reconcile(ResourceKey::new("a"), |_| async move {
            let _ = wait.await;
            Ok(1)
        });
        let cancel = async {
            tokio::task::yield_now().await;
            resource.cancel_fetch();
            assert!(resource.slot().in_flight());
            resource.cancel();
            let _ = release.send(());
        };

        let (reconciled, ()) = tokio::join!(reconcile, cancel);
        assert_eq!(reconciled, Err(CaseworkError::Cancelled));
        assert!(!resource.is_loading());
    }
}
