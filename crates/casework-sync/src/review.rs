//! Transaction review synchronizer.
//!
//! Holds the review record for one transaction and runs the four workflow
//! actions through an [`OptimisticEngine`] sharing the resource's data cell.
//! Every action ends in a refetch of the review; the projection is never
//! the final value.

use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use casework_core::effects::{AbortSignal, Method};
use casework_core::errors::{CaseworkError, Result};
use casework_core::reactive::Subscription;
use casework_core::types::{
    AssignRequest, EscalateRequest, ResolveRequest, ReviewAction, ReviewStatus,
    StatusUpdateRequest, TransactionReview,
};

use crate::context::SyncContext;
use crate::decode;
use crate::mutation::OptimisticEngine;
use crate::resource::{FetchOutcome, Resource};
use crate::slot::ResourceKey;

/// Review record of one transaction plus its workflow actions.
#[derive(Clone)]
pub struct ReviewSynchronizer {
    inner: Arc<ReviewInner>,
}

struct ReviewInner {
    ctx: SyncContext,
    transaction_id: String,
    resource: Resource<TransactionReview>,
    engine: OptimisticEngine<Option<TransactionReview>>,
}

impl ReviewInner {
    fn key(&self) -> ResourceKey {
        ResourceKey::new(self.transaction_id.as_str())
    }

    async fn fetch_review(&self, signal: AbortSignal) -> Result<TransactionReview> {
        let path = self.ctx.paths().review(&self.transaction_id);
        let body = self
            .ctx
            .fetch(&path, &signal, "Failed to fetch review")
            .await?;
        decode::review(body)
    }
}

impl fmt::Debug for ReviewSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewSynchronizer")
            .field("transaction_id", &self.inner.transaction_id)
            .field("engine", &self.inner.engine)
            .finish_non_exhaustive()
    }
}

impl ReviewSynchronizer {
    /// Synchronizer for one transaction's review. Nothing is fetched until [`fetch`](Self::fetch).
    pub fn new(ctx: SyncContext, transaction_id: impl Into<String>) -> Self {
        let resource = Resource::new("review");
        let engine = OptimisticEngine::new("review", resource.data_cell().clone());
        Self {
            inner: Arc::new(ReviewInner {
                ctx,
                transaction_id: transaction_id.into(),
                resource,
                engine,
            }),
        }
    }

    // ─── Fetching ────────────────────────────────────────────

    /// Load the review on first use. Returns `Skipped` once a review is held.
    pub async fn fetch(&self) -> FetchOutcome {
        if self.inner.resource.has_data() {
            return FetchOutcome::Skipped;
        }
        self.refresh().await
    }

    /// Refetch the review, superseding any fetch in flight.
    pub async fn refresh(&self) -> FetchOutcome {
        let inner = &self.inner;
        inner
            .resource
            .load(inner.key(), |signal| inner.fetch_review(signal))
            .await
    }

    /// Cancel the fetch in flight, if any.
    pub fn dispose(&self) {
        self.inner.resource.cancel();
    }

    // ─── Actions ─────────────────────────────────────────────

    /// Take ownership of the review. Allowed from every status but `CLOSED`;
    /// a closed review is rejected by the server and rolled back.
    pub async fn assign(
        &self,
        analyst_id: impl Into<String>,
        analyst_name: Option<String>,
    ) -> Result<()> {
        let request = AssignRequest {
            analyst_id: analyst_id.into(),
            analyst_name,
        };
        let ctx = &self.inner.ctx;
        let path = ctx.paths().review_assign(&self.inner.transaction_id);
        let remote = ctx.send(Method::Post, &path, &request, "Failed to assign review");
        self.transition(
            ReviewAction::Assign.target(),
            |review, now| review.assigned(&request, now),
            remote,
        )
        .await
    }

    /// Move the review to `status`; the server decides legality.
    pub async fn update_status(&self, status: ReviewStatus) -> Result<()> {
        let ctx = &self.inner.ctx;
        let path = ctx.paths().review_status(&self.inner.transaction_id);
        let body = StatusUpdateRequest { status };
        let remote = ctx.send(Method::Patch, &path, &body, "Failed to update review status");
        self.transition(status, |review, now| review.with_status(status, now), remote)
            .await
    }

    /// Record a decision. Omitted optional fields keep their stored values.
    pub async fn resolve(&self, request: ResolveRequest) -> Result<()> {
        if request.resolution_code.trim().is_empty() {
            return Err(CaseworkError::invalid("resolution code must not be empty"));
        }
        let ctx = &self.inner.ctx;
        let path = ctx.paths().review_resolve(&self.inner.transaction_id);
        let remote = ctx.send(Method::Post, &path, &request, "Failed to resolve review");
        self.transition(
            ReviewAction::Resolve.target(),
            |review, now| review.resolved(&request, now),
            remote,
        )
        .await
    }

    /// Hand the review to a supervisor.
    pub async fn escalate(&self, request: EscalateRequest) -> Result<()> {
        let ctx = &self.inner.ctx;
        let path = ctx.paths().review_escalate(&self.inner.transaction_id);
        let remote = ctx.send(Method::Post, &path, &request, "Failed to escalate review");
        self.transition(
            ReviewAction::Escalate.target(),
            |review, now| review.escalated(&request, now),
            remote,
        )
        .await
    }

    async fn transition<P, Fut, R>(
        &self,
        target: ReviewStatus,
        project: P,
        remote: Fut,
    ) -> Result<()>
    where
        P: FnOnce(&TransactionReview, DateTime<Utc>) -> TransactionReview,
        Fut: Future<Output = Result<R>>,
    {
        let inner = &self.inner;
        let Some(from) = inner.resource.data_cell().with(|r| r.as_ref().map(|r| r.status)) else {
            return Err(CaseworkError::not_found(format!(
                "review for transaction {} has not been loaded",
                inner.transaction_id
            )));
        };
        if !from.can_transition_to(target) {
            tracing::debug!(
                transaction_id = %inner.transaction_id,
                %from,
                to = %target,
                "attempting transition outside the client table"
            );
        }

        inner.resource.cancel_fetch();
        inner
            .engine
            .run(
                inner.ctx.now(),
                |prev, now| prev.as_ref().map(|review| project(review, now)),
                remote,
                |_| async {
                    inner
                        .resource
                        .reconcile(inner.key(), |signal| inner.fetch_review(signal))
                        .await
                        .map(|reconciled| reconciled.map(Some))
                },
            )
            .await
            .into_result()
    }

    // ─── State ───────────────────────────────────────────────

    /// Transaction this review belongs to.
    pub fn transaction_id(&self) -> &str {
        &self.inner.transaction_id
    }

    /// Review record, including any optimistic projection.
    pub fn review(&self) -> Option<TransactionReview> {
        self.inner.resource.data()
    }

    /// Current status, if loaded.
    pub fn status(&self) -> Option<ReviewStatus> {
        self.inner
            .resource
            .data_cell()
            .with(|r| r.as_ref().map(|r| r.status))
    }

    /// Actions the client table allows from the current status.
    pub fn legal_actions(&self) -> Vec<ReviewAction> {
        self.status().map_or_else(Vec::new, |status| {
            ReviewAction::ALL
                .into_iter()
                .filter(|action| action.is_legal_from(status))
                .collect()
        })
    }

    /// Whether a fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.inner.resource.is_loading()
    }

    /// Error from the last fetch.
    pub fn error(&self) -> Option<CaseworkError> {
        self.inner.resource.error()
    }

    /// Whether a workflow action is in flight.
    pub fn is_mutating(&self) -> bool {
        self.inner.engine.is_mutating()
    }

    /// Subscribe to the review record.
    pub fn subscribe(&self) -> Subscription<Option<TransactionReview>> {
        self.inner.resource.subscribe()
    }

    /// Subscribe to the mutating flag.
    pub fn subscribe_mutating(&self) -> Subscription<bool> {
        self.inner.engine.subscribe_mutating()
    }
}
