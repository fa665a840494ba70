//! Optimistic mutation engine
//!
//! One engine guards one entity (a review record, a note list, ...). Each
//! mutation:
//!
//! 1. takes a sequence number and snapshots the current value,
//! 2. raises the mutating flag,
//! 3. writes the projected value synchronously,
//! 4. awaits the remote call, then the reconciling refetch,
//! 5. commits the reconciled value, or rolls back on any failure.
//!
//! A mutation owns the entity when it settles if no newer mutation is still
//! in flight and none has committed. Only the owner writes. A superseded
//! mutation whose refetch succeeded still records the server value as the
//! last confirmed value, so a later rollback never resurrects an earlier
//! projection. A rollback restores the mutation's own snapshot while older
//! mutations are still in flight (they settle afterwards), and the last
//! confirmed value otherwise.
//!
//! The mutating flag tracks the in-flight set, which a drop guard keeps
//! accurate when the mutation future is dropped mid-flight. A dropped
//! mutation settles as a failure.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use casework_core::errors::{CaseworkError, Result};
use casework_core::reactive::{Dynamic, Subscription};

/// How a mutation settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Remote call and refetch succeeded; the server value is visible
    Committed,
    /// Something failed; the last known server value was restored
    RolledBack(CaseworkError),
    /// A newer mutation or fetch owns the entity; this one wrote nothing
    Superseded {
        /// The failure, if this mutation failed
        error: Option<CaseworkError>,
    },
}

impl MutationOutcome {
    /// Whether the reconciled value was written.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }

    /// The error to hand back to the caller, if any.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Committed | Self::Superseded { error: None } => Ok(()),
            Self::RolledBack(err) | Self::Superseded { error: Some(err) } => Err(err),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::RolledBack(_) => "rolled_back",
            Self::Superseded { .. } => "superseded",
        }
    }
}

/// Result of a reconciling refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled<T> {
    /// The authoritative value
    Value(T),
    /// A newer request on the same slot took over and publishes instead
    HandedOff,
}

impl<T> Reconciled<T> {
    /// Map the authoritative value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reconciled<U> {
        match self {
            Self::Value(value) => Reconciled::Value(f(value)),
            Self::HandedOff => Reconciled::HandedOff,
        }
    }
}

#[derive(Debug)]
struct Ledger<T> {
    pending: BTreeSet<u64>,
    committed: u64,
    confirmed: Option<T>,
    confirmed_seq: u64,
}

/// Snapshot/project/reconcile driver for one entity.
pub struct OptimisticEngine<T> {
    entity: String,
    value: Dynamic<T>,
    mutating: Dynamic<bool>,
    ledger: Arc<Mutex<Ledger<T>>>,
    latest: Arc<AtomicU64>,
}

impl<T> Clone for OptimisticEngine<T> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            value: self.value.clone(),
            mutating: self.mutating.clone(),
            ledger: Arc::clone(&self.ledger),
            latest: Arc::clone(&self.latest),
        }
    }
}

impl<T> fmt::Debug for OptimisticEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ledger = self.ledger.lock();
        f.debug_struct("OptimisticEngine")
            .field("entity", &self.entity)
            .field("in_flight", &ledger.pending.len())
            .field("committed", &ledger.committed)
            .field("latest", &self.latest.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> OptimisticEngine<T> {
    /// Engine writing through `value`. `entity` labels trace events.
    pub fn new(entity: impl Into<String>, value: Dynamic<T>) -> Self {
        Self {
            entity: entity.into(),
            value,
            mutating: Dynamic::new(false),
            ledger: Arc::new(Mutex::new(Ledger {
                pending: BTreeSet::new(),
                committed: 0,
                confirmed: None,
                confirmed_seq: 0,
            })),
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run one optimistic mutation.
    ///
    /// `project` computes the optimistic value from the snapshot and `now`.
    /// `remote` is the server call; its response is handed to `reconcile`,
    /// which must produce the authoritative value or report a hand-off.
    pub async fn run<P, R, Fut, C, CFut>(
        &self,
        now: DateTime<Utc>,
        project: P,
        remote: Fut,
        reconcile: C,
    ) -> MutationOutcome
    where
        P: FnOnce(&T, DateTime<Utc>) -> T,
        Fut: Future<Output = Result<R>>,
        C: FnOnce(R) -> CFut,
        CFut: Future<Output = Result<Reconciled<T>>>,
    {
        let sequence = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pending = self.begin(sequence);

        if let Some(previous) = pending.snapshot.as_ref() {
            self.value.set(project(previous, now));
        }
        tracing::debug!(entity = %self.entity, sequence, "optimistic projection applied");

        let settled = match remote.await {
            Ok(response) => reconcile(response).await,
            Err(err) => Err(err),
        };

        let snapshot = pending.disarm();
        let outcome = self.settle(sequence, snapshot, settled);

        match &outcome {
            MutationOutcome::RolledBack(err) => {
                tracing::warn!(
                    entity = %self.entity,
                    sequence,
                    error = %err,
                    "mutation rolled back"
                );
            }
            other => {
                tracing::debug!(
                    entity = %self.entity,
                    sequence,
                    outcome = other.label(),
                    "mutation settled"
                );
            }
        }
        outcome
    }

    fn begin(&self, sequence: u64) -> PendingMutation<'_, T> {
        let current = self.value.get();
        {
            let mut ledger = self.ledger.lock();
            if ledger.pending.is_empty() {
                ledger.confirmed = Some(current.clone());
                ledger.confirmed_seq = 0;
            }
            ledger.pending.insert(sequence);
            self.mutating.set_if_changed(true);
        }
        PendingMutation {
            engine: self,
            sequence,
            snapshot: Some(current),
            armed: true,
        }
    }

    fn settle(
        &self,
        sequence: u64,
        snapshot: Option<T>,
        settled: Result<Reconciled<T>>,
    ) -> MutationOutcome {
        let mut ledger = self.ledger.lock();
        ledger.pending.remove(&sequence);
        let newer_pending = ledger.pending.range(sequence + 1..).next().is_some();
        let older_pending = ledger.pending.range(..sequence).next().is_some();
        let owner = !newer_pending && ledger.committed < sequence;

        let outcome = match settled {
            Ok(Reconciled::Value(authoritative)) => {
                if ledger.confirmed_seq < sequence {
                    ledger.confirmed = Some(authoritative.clone());
                    ledger.confirmed_seq = sequence;
                }
                if owner {
                    ledger.committed = sequence;
                    self.value.set(authoritative);
                    MutationOutcome::Committed
                } else {
                    MutationOutcome::Superseded { error: None }
                }
            }
            Ok(Reconciled::HandedOff) => MutationOutcome::Superseded { error: None },
            Err(err) if owner => {
                let restore = if older_pending {
                    snapshot
                } else {
                    ledger.confirmed.clone().or(snapshot)
                };
                if let Some(restore) = restore {
                    self.value.set(restore);
                }
                MutationOutcome::RolledBack(err)
            }
            Err(err) => MutationOutcome::Superseded { error: Some(err) },
        };

        if ledger.pending.is_empty() {
            self.mutating.set_if_changed(false);
        }
        outcome
    }

    // ─── State ───────────────────────────────────────────────

    /// Current value of the entity.
    pub fn value(&self) -> T {
        self.value.get()
    }

    /// Cell the engine writes through.
    pub fn value_cell(&self) -> &Dynamic<T> {
        &self.value
    }

    /// Whether any mutation is in flight.
    pub fn is_mutating(&self) -> bool {
        self.mutating.get()
    }

    /// Observe the mutating flag.
    pub fn subscribe_mutating(&self) -> Subscription<bool> {
        self.mutating.subscribe()
    }

    /// Number of mutations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.ledger.lock().pending.len()
    }

    /// Sequence number of the most recent mutation (0 before any).
    pub fn latest_sequence(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

/// Drop guard for one in-flight mutation.
struct PendingMutation<'a, T: Clone + Send + Sync + 'static> {
    engine: &'a OptimisticEngine<T>,
    sequence: u64,
    snapshot: Option<T>,
    armed: bool,
}

impl<T: Clone + Send + Sync + 'static> PendingMutation<'_, T> {
    fn disarm(&mut self) -> Option<T> {
        self.armed = false;
        self.snapshot.take()
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for PendingMutation<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let outcome = self
            .engine
            .settle(self.sequence, self.snapshot.take(), Err(CaseworkError::Cancelled));
        tracing::debug!(
            entity = %self.engine.entity,
            sequence = self.sequence,
            outcome = outcome.label(),
            "mutation dropped before settling"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use tokio::sync::oneshot;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn engine(initial: u32) -> OptimisticEngine<u32> {
        OptimisticEngine::new("counter", Dynamic::new(initial))
    }

    #[tokio::test]
    async fn test_commit_writes_reconciled_value() {
        let engine = engine(1);
        let outcome = engine
            .run(now(), |v, _| v + 10, async { Ok(()) }, |_| async { Ok(Reconciled::Value(5)) })
            .await;
        assert_eq!(outcome, MutationOutcome::Committed);
        assert_eq!(engine.value(), 5);
        assert!(!engine.is_mutating());
    }

    #[tokio::test]
    async fn test_remote_failure_restores_snapshot() {
        let engine = engine(1);
        let outcome = engine
            .run(
                now(),
                |v, _| v + 10,
                async { Err::<(), _>(CaseworkError::invalid_transition("closed")) },
                |_| async { Ok(Reconciled::Value(99)) },
            )
            .await;
        assert_matches!(
            outcome,
            MutationOutcome::RolledBack(CaseworkError::InvalidTransition { .. })
        );
        assert_eq!(engine.value(), 1);
        assert!(!engine.is_mutating());
    }

    #[tokio::test]
    async fn test_reconcile_failure_restores_snapshot() {
        let engine = engine(1);
        let outcome = engine
            .run(
                now(),
                |v, _| v + 10,
                async { Ok(()) },
                |_| async { Err::<Reconciled<u32>, _>(CaseworkError::Cancelled) },
            )
            .await;
        assert_matches!(outcome, MutationOutcome::RolledBack(CaseworkError::Cancelled));
        assert_eq!(engine.value(), 1);
    }

    #[tokio::test]
    async fn test_projection_is_visible_before_settlement() {
        let engine = engine(1);
        let (release, wait) = oneshot::channel::<()>();
        let observer = engine.clone();

        let mutation = engine.run(
            now(),
            |v, _| v + 1,
            async move {
                let _ = wait.await;
                Ok(())
            },
            |_| async { Ok(Reconciled::Value(2)) },
        );
        let check = async move {
            tokio::task::yield_now().await;
            let seen = (observer.value(), observer.is_mutating());
            let _ = release.send(());
            seen
        };

        let (outcome, seen) = tokio::join!(mutation, check);
        assert_eq!(seen, (2, true));
        assert!(outcome.is_committed());
    }

    #[tokio::test]
    async fn test_older_mutation_settling_late_is_superseded() {
        let engine = engine(0);
        let (release_first, wait_first) = oneshot::channel::<()>();

        let first = engine.run(
            now(),
            |_, _| 1,
            async move {
                let _ = wait_first.await;
                Err::<(), _>(CaseworkError::network("timeout"))
            },
            |_| async { Ok(Reconciled::Value(100)) },
        );
        let second = async {
            tokio::task::yield_now().await;
            let outcome = engine
                .run(now(), |_, _| 2, async { Ok(()) }, |_| async { Ok(Reconciled::Value(20)) })
                .await;
            let _ = release_first.send(());
            outcome
        };

        let (first, second) = tokio::join!(first, second);
        assert!(second.is_committed());
        assert_matches!(first, MutationOutcome::Superseded { error: Some(_) });
        assert_eq!(engine.value(), 20);
        assert!(!engine.is_mutating());
        assert_eq!(engine.latest_sequence(), 2);
    }

    #[tokio::test]
    async fn test_dropped_mutation_clears_flag_and_restores() {
        let engine = engine(3);
        {
            let mutation = engine.run(
                now(),
                |v, _| v * 2,
                std::future::pending::<Result<()>>(),
                |_| async { Ok(Reconciled::Value(0)) },
            );
            let mut mutation = Box::pin(mutation);
            let polled = futures::poll!(mutation.as_mut());
            assert!(polled.is_pending());
            assert_eq!(engine.value(), 6);
            assert!(engine.is_mutating());
        }
        assert!(!engine.is_mutating());
        assert_eq!(engine.in_flight(), 0);
        assert_eq!(engine.value(), 3);
    }

    #[tokio::test]
    async fn test_superseded_success_becomes_rollback_target() {
        let engine = engine(0);
        let (release_first, wait_first) = oneshot::channel::<()>();
        let (release_second, wait_second) = oneshot::channel::<()>();

        let first = engine.run(
            now(),
            |v, _| v + 1,
            async move {
                let _ = wait_first.await;
                Ok(())
            },
            |_| async { Ok(Reconciled::Value(10)) },
        );
        let second = async {
            tokio::task::yield_now().await;
            engine
                .run(
                    now(),
                    |v, _| v + 100,
                    async move {
                        let _ = wait_second.await;
                        Err::<(), _>(CaseworkError::remote(Some(500), "boom"))
                    },
                    |_| async { Ok(Reconciled::Value(99)) },
                )
                .await
        };
        let driver = async {
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            assert_eq!(engine.value(), 101);
            let _ = release_first.send(());
            tokio::task::yield_now().await;
            let _ = release_second.send(());
        };

        let (first, second, ()) = tokio::join!(first, second, driver);
        assert_eq!(first, MutationOutcome::Superseded { error: None });
        assert_matches!(second, MutationOutcome::RolledBack(CaseworkError::Remote { .. }));
        assert_eq!(engine.value(), 10);
        assert!(!engine.is_mutating());
    }

    #[tokio::test]
    async fn test_rollback_keeps_older_pending_projection() {
        let engine = engine(0);
        let (release_first, wait_first) = oneshot::channel::<()>();

        let first = engine.run(
            now(),
            |v, _| v + 1,
            async move {
                let _ = wait_first.await;
                Ok(())
            },
            |_| async { Ok(Reconciled::Value(10)) },
        );
        let second = async {
            tokio::task::yield_now().await;
            let outcome = engine
                .run(
                    now(),
                    |v, _| v + 100,
                    async { Err::<(), _>(CaseworkError::network("offline")) },
                    |_| async { Ok(Reconciled::Value(99)) },
                )
                .await;
            let seen = engine.value();
            let _ = release_first.send(());
            (outcome, seen)
        };

        let (first, (second, seen)) = tokio::join!(first, second);
        assert_matches!(second, MutationOutcome::RolledBack(_));
        assert_eq!(seen, 1);
        assert!(first.is_committed());
        assert_eq!(engine.value(), 10);
    }

    #[tokio::test]
    async fn test_handed_off_mutation_writes_nothing() {
        let engine = engine(1);
        let observer = engine.clone();
        let outcome = engine
            .run(now(), |v, _| v + 1, async { Ok(()) }, |_| async move {
                observer.value_cell().set(42);
                Ok(Reconciled::HandedOff)
            })
            .await;
        assert_eq!(outcome, MutationOutcome::Superseded { error: None });
        assert!(outcome.into_result().is_ok());
        assert_eq!(engine.value(), 42);
        assert!(!engine.is_mutating());
    }

    #[test]
    fn test_outcome_into_result() {
        assert!(MutationOutcome::Committed.into_result().is_ok());
        assert!(MutationOutcome::Superseded { error: None }.into_result().is_ok());
        assert!(MutationOutcome::RolledBack(CaseworkError::network("x"))
            .into_result()
            .is_err());
    }
}
