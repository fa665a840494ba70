//! Analyst worklist: queued items plus header counters.
//!
//! Items and counters are fetched together and held as one snapshot so a
//! claim can project onto both and roll both back together.

use chrono::{DateTime, Utc};
use futures::future::try_join;
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;

use casework_core::effects::{AbortSignal, Method};
use casework_core::errors::{CaseworkError, Result};
use casework_core::reactive::Subscription;
use casework_core::types::{PageRequest, WorklistFilter, WorklistItem, WorklistStats};

use super::ListState;
use crate::context::SyncContext;
use crate::decode;
use crate::mutation::OptimisticEngine;
use crate::resource::{FetchOutcome, Resource};
use crate::slot::ResourceKey;

/// Worklist items and counters as of one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorklistSnapshot {
    /// Queue page.
    pub items: ListState<WorklistItem>,
    /// Header counters.
    pub stats: WorklistStats,
}

impl WorklistSnapshot {
    /// Optimistic result of `analyst_id` claiming the next unassigned item:
    /// the first unassigned item in queue order is marked claimed and the
    /// counters move by one. With nothing unassigned locally the snapshot is
    /// unchanged and the server decides.
    pub fn claimed_next(&self, analyst_id: &str, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(item) = next.items.items.iter_mut().find(|i| i.is_unassigned()) {
            *item = item.claimed_by(analyst_id, now);
            next.stats = next.stats.after_claim();
        }
        next
    }
}

#[derive(Debug, Clone)]
struct QueueParams {
    filter: WorklistFilter,
    page: PageRequest,
}

impl QueueParams {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = self.filter.query_pairs();
        query.extend(self.page.query_pairs());
        query
    }

    fn key(&self) -> ResourceKey {
        ResourceKey::from_parts(self.query().iter().map(|(k, v)| format!("{k}={v}")))
    }
}

/// The calling analyst's work queue.
#[derive(Clone)]
pub struct WorklistSynchronizer {
    inner: Arc<WorklistInner>,
}

struct WorklistInner {
    ctx: SyncContext,
    analyst_id: String,
    params: RwLock<QueueParams>,
    resource: Resource<WorklistSnapshot>,
    engine: OptimisticEngine<Option<WorklistSnapshot>>,
}

impl WorklistInner {
    async fn fetch_snapshot(
        &self,
        params: QueueParams,
        signal: AbortSignal,
    ) -> Result<WorklistSnapshot> {
        let list_path = self.ctx.paths().worklist(&params.query());
        let stats_path = self.ctx.paths().worklist_stats();
        let (items, stats) = try_join(
            async {
                let body = self
                    .ctx
                    .fetch(&list_path, &signal, "Failed to fetch worklist")
                    .await?;
                decode::list(body, "worklist")
            },
            async {
                let body = self
                    .ctx
                    .fetch(&stats_path, &signal, "Failed to fetch worklist stats")
                    .await?;
                decode::worklist_stats(body)
            },
        )
        .await?;
        Ok(WorklistSnapshot { items, stats })
    }
}

impl WorklistSynchronizer {
    /// Synchronizer for `analyst_id`'s queue. Nothing is fetched until [`fetch`](Self::fetch).
    pub fn new(ctx: SyncContext, analyst_id: impl Into<String>, filter: WorklistFilter) -> Self {
        let page = PageRequest::first(ctx.collections().page_size);
        let resource = Resource::new("worklist");
        let engine = OptimisticEngine::new("worklist", resource.data_cell().clone());
        Self {
            inner: Arc::new(WorklistInner {
                ctx,
                analyst_id: analyst_id.into(),
                params: RwLock::new(QueueParams { filter, page }),
                resource,
                engine,
            }),
        }
    }

    /// Fetch items and counters for the current filter.
    pub async fn fetch(&self) -> FetchOutcome {
        let params = self.inner.params.read().clone();
        let inner = Arc::clone(&self.inner);
        self.inner
            .resource
            .load(params.key(), move |signal| async move {
                inner.fetch_snapshot(params, signal).await
            })
            .await
    }

    /// Replace the filter and refetch from the first page.
    pub async fn set_filter(&self, filter: WorklistFilter) -> FetchOutcome {
        {
            let mut params = self.inner.params.write();
            params.filter = filter;
            params.page = PageRequest::first(params.page.page_size);
        }
        self.fetch().await
    }

    /// Move to `page` and refetch.
    pub async fn set_page(&self, page: PageRequest) -> FetchOutcome {
        self.inner.params.write().page = page;
        self.fetch().await
    }

    /// Abort any outstanding fetch.
    pub fn dispose(&self) {
        self.inner.resource.cancel();
    }

    /// Claim the next item from the queue.
    ///
    /// Returns the item the server assigned, or `None` when the queue was
    /// empty.
    pub async fn claim_next(&self) -> Result<Option<WorklistItem>> {
        let inner = &self.inner;
        let params = inner.params.read().clone();
        let key = params.key();
        let now = inner.ctx.now();
        let path = inner.ctx.paths().worklist_claim();
        let mut body = json!({ "analyst_id": inner.analyst_id });
        if let Some(priority) = params.filter.priority {
            body["priority"] = json!(priority);
        }

        inner.resource.cancel_fetch();
        let mut claimed = None;
        let remote = async {
            let response = inner
                .ctx
                .send(Method::Post, &path, &body, "Failed to claim work item")
                .await?;
            claimed = decode::claimed_item(response)?;
            Ok::<(), CaseworkError>(())
        };
        let loader_inner = Arc::clone(inner);
        let outcome = inner
            .engine
            .run(
                now,
                |prev, now| {
                    let base = prev.clone().unwrap_or_default();
                    Some(base.claimed_next(&inner.analyst_id, now))
                },
                remote,
                |()| async move {
                    inner
                        .resource
                        .reconcile(key, move |signal| async move {
                            loader_inner.fetch_snapshot(params, signal).await
                        })
                        .await
                        .map(|reconciled| reconciled.map(Some))
                },
            )
            .await;
        outcome.into_result()?;

        match &claimed {
            Some(item) => tracing::info!(
                item_id = %item.id,
                transaction_id = %item.transaction_id,
                "work item claimed"
            ),
            None => tracing::info!("worklist empty, nothing claimed"),
        }
        Ok(claimed)
    }

    // ─── State ───────────────────────────────────────────────

    /// Items and counters as last fetched or projected.
    pub fn snapshot(&self) -> Option<WorklistSnapshot> {
        self.inner.resource.data()
    }

    /// Queue items, empty before the first fetch.
    pub fn items(&self) -> Vec<WorklistItem> {
        self.inner
            .resource
            .data_cell()
            .with(|s| s.as_ref().map(|s| s.items.items.clone()).unwrap_or_default())
    }

    /// Counters, zeroed before the first fetch.
    pub fn stats(&self) -> WorklistStats {
        self.inner
            .resource
            .data_cell()
            .with(|s| s.as_ref().map(|s| s.stats.clone()).unwrap_or_default())
    }

    /// Active filter.
    pub fn filter(&self) -> WorklistFilter {
        self.inner.params.read().filter.clone()
    }

    /// Whether a fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.inner.resource.is_loading()
    }

    /// Error from the last fetch.
    pub fn error(&self) -> Option<CaseworkError> {
        self.inner.resource.error()
    }

    /// Whether a claim is in flight.
    pub fn is_mutating(&self) -> bool {
        self.inner.engine.is_mutating()
    }

    /// Subscribe to the snapshot.
    pub fn subscribe(&self) -> Subscription<Option<WorklistSnapshot>> {
        self.inner.resource.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_core::types::{Priority, ReviewStatus};
    use chrono::TimeZone;

    fn item(id: &str, assigned: Option<&str>) -> WorklistItem {
        WorklistItem {
            id: id.into(),
            transaction_id: format!("txn-{id}"),
            priority: Priority::High,
            risk_score: Some(80.0),
            review_status: ReviewStatus::Pending,
            assigned_analyst_id: assigned.map(str::to_string),
            queued_at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            claimed_at: None,
        }
    }

    #[test]
    fn test_claim_projection_takes_first_unassigned() {
        let snapshot = WorklistSnapshot {
            items: ListState::new(
                vec![item("a", Some("other")), item("b", None), item("c", None)],
                3,
            ),
            stats: WorklistStats {
                total: 3,
                unassigned: 2,
                assigned_to_me: 0,
                ..WorklistStats::default()
            },
        };
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let next = snapshot.claimed_next("me", now);

        assert_eq!(next.items.items[1].assigned_analyst_id.as_deref(), Some("me"));
        assert_eq!(next.items.items[1].review_status, ReviewStatus::InReview);
        assert!(next.items.items[2].is_unassigned());
        assert_eq!(next.stats.unassigned, 1);
        assert_eq!(next.stats.assigned_to_me, 1);
    }

    #[test]
    fn test_claim_projection_noop_when_nothing_unassigned() {
        let snapshot = WorklistSnapshot {
            items: ListState::new(vec![item("a", Some("other"))], 1),
            stats: WorklistStats::default(),
        };
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        assert_eq!(snapshot.claimed_next("me", now), snapshot);
    }
}
