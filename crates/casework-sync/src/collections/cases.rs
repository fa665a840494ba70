//! Case list and case detail.
//!
//! The list and the open case each fetch through their own slot of one
//! [`AbortCoordinator`], so paging the list never cancels the detail view
//! and [`CasesSynchronizer::dispose`] stops both.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;

use casework_core::effects::{AbortSignal, Method};
use casework_core::errors::{CaseworkError, Result};
use casework_core::reactive::Subscription;
use casework_core::types::{
    CaseFilter, CaseRecord, CreateCaseRequest, PageRequest, RecordId, ResolveCaseRequest,
    UpdateCaseRequest,
};

use super::{Identified, ListState, ListSync};
use crate::context::SyncContext;
use crate::decode;
use crate::resource::{FetchOutcome, Resource};
use crate::slot::{AbortCoordinator, ResourceKey};

const LIST_SLOT: &str = "cases";
const DETAIL_SLOT: &str = "case-detail";

/// Filtered, paginated case list plus one open case.
#[derive(Clone)]
pub struct CasesSynchronizer {
    inner: Arc<CasesInner>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ListParams {
    filter: CaseFilter,
    page: PageRequest,
}

impl ListParams {
    fn key(&self) -> ResourceKey {
        let query = self.query();
        ResourceKey::from_parts(query.iter().map(|(k, v)| format!("{k}={v}")))
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = self.filter.query_pairs();
        query.extend(self.page.query_pairs());
        query
    }
}

struct CasesInner {
    ctx: SyncContext,
    analyst_id: String,
    params: RwLock<ListParams>,
    coordinator: AbortCoordinator,
    list: ListSync<CaseRecord>,
    detail: Resource<CaseRecord>,
}

impl CasesInner {
    async fn fetch_list(
        &self,
        params: ListParams,
        signal: AbortSignal,
    ) -> Result<ListState<CaseRecord>> {
        let path = self.ctx.paths().cases(&params.query());
        let body = self.ctx.fetch(&path, &signal, "Failed to fetch cases").await?;
        decode::list(body, "cases")
    }

    async fn fetch_case(&self, case_id: &str, signal: AbortSignal) -> Result<CaseRecord> {
        let path = self.ctx.paths().case(case_id);
        let body = self.ctx.fetch(&path, &signal, "Failed to fetch case").await?;
        decode::record(body, "case")
    }
}

impl CasesSynchronizer {
    /// Case list for `filter`, first page. New cases are created as
    /// `analyst_id`.
    pub fn new(ctx: SyncContext, analyst_id: impl Into<String>, filter: CaseFilter) -> Self {
        let page = PageRequest::first(ctx.collections().page_size);
        let coordinator = AbortCoordinator::new();
        let list = ListSync::new(Resource::with_slot(coordinator.slot(LIST_SLOT)), "cases");
        let detail = Resource::with_slot(coordinator.slot(DETAIL_SLOT));
        Self {
            inner: Arc::new(CasesInner {
                ctx,
                analyst_id: analyst_id.into(),
                params: RwLock::new(ListParams { filter, page }),
                coordinator,
                list,
                detail,
            }),
        }
    }

    // ─── Fetching ────────────────────────────────────────────

    /// Fetch the list for the current filter and page.
    pub async fn fetch(&self) -> FetchOutcome {
        let params = self.inner.params.read().clone();
        let inner = Arc::clone(&self.inner);
        self.inner
            .list
            .resource()
            .load(params.key(), move |signal| async move {
                inner.fetch_list(params, signal).await
            })
            .await
    }

    /// Replace the filter, reset to the first page and refetch. The fetch
    /// for the old filter, if still running, is superseded.
    pub async fn set_filter(&self, filter: CaseFilter) -> FetchOutcome {
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

    /// Load one case into the detail view.
    pub async fn open_case(&self, case_id: &str) -> FetchOutcome {
        let inner = Arc::clone(&self.inner);
        let id = case_id.to_string();
        self.inner
            .detail
            .load(ResourceKey::new(case_id), move |signal| async move {
                inner.fetch_case(&id, signal).await
            })
            .await
    }

    /// Close the detail view.
    pub fn close_case(&self) {
        self.inner.detail.clear();
    }

    /// Cancel every fetch in flight.
    pub fn dispose(&self) {
        let cancelled = self.inner.coordinator.cancel_all();
        if cancelled > 0 {
            tracing::debug!(cancelled, "case fetches cancelled");
        }
    }

    // ─── Mutations ───────────────────────────────────────────

    /// Create a case; a placeholder heads the list until the refetch.
    pub async fn create(&self, request: CreateCaseRequest) -> Result<()> {
        if request.title.trim().is_empty() {
            return Err(CaseworkError::invalid("case title must not be empty"));
        }
        let ctx = &self.inner.ctx;
        let now = ctx.now();
        let placeholder = CaseRecord::placeholder(
            RecordId::local_from_timestamp(
                &ctx.collections().placeholder_prefix,
                ctx.timestamp_ms(),
            ),
            &self.inner.analyst_id,
            &request,
            now,
        );
        tracing::info!(title = %request.title, priority = %request.priority, "creating case");

        let path = ctx.paths().cases(&[]);
        let remote = ctx.send(Method::Post, &path, &request, "Failed to create case");
        self.mutate_list(move |list, _| list.prepended(placeholder), remote)
            .await
    }

    /// Patch a case.
    pub async fn update(&self, case_id: &RecordId, request: UpdateCaseRequest) -> Result<()> {
        let server_id = case_id.require_confirmed()?;
        let ctx = &self.inner.ctx;
        let path = ctx.paths().case(server_id);
        let remote = ctx.send(Method::Patch, &path, &request, "Failed to update case");
        self.mutate_case(case_id, |case, now| case.patched(&request, now), remote)
            .await
    }

    /// Resolve a case.
    pub async fn resolve(&self, case_id: &RecordId, request: ResolveCaseRequest) -> Result<()> {
        if request.resolution_code.trim().is_empty() {
            return Err(CaseworkError::invalid("resolution code must not be empty"));
        }
        let server_id = case_id.require_confirmed()?;
        let ctx = &self.inner.ctx;
        let path = ctx.paths().case_resolve(server_id);
        let remote = ctx.send(Method::Post, &path, &request, "Failed to resolve case");
        self.mutate_case(case_id, |case, now| case.resolved(&request, now), remote)
            .await
    }

    /// Link a transaction to a case. Linking an already linked transaction
    /// is a no-op projection but still goes to the server.
    pub async fn add_transaction(&self, case_id: &RecordId, transaction_id: &str) -> Result<()> {
        let server_id = case_id.require_confirmed()?;
        let ctx = &self.inner.ctx;
        let path = ctx.paths().case_transactions(server_id);
        let body = json!({ "transaction_id": transaction_id });
        let remote = ctx.send(Method::Post, &path, &body, "Failed to link transaction");
        self.mutate_case(
            case_id,
            |case, now| case.with_transaction(transaction_id, now),
            remote,
        )
        .await
    }

    /// Unlink a transaction from a case.
    pub async fn remove_transaction(&self, case_id: &RecordId, transaction_id: &str) -> Result<()> {
        let server_id = case_id.require_confirmed()?;
        let ctx = &self.inner.ctx;
        let path = ctx.paths().case_transaction(server_id, transaction_id);
        let remote = ctx.call(Method::Delete, &path, None, None, "Failed to unlink transaction");
        self.mutate_case(
            case_id,
            |case, now| case.without_transaction(transaction_id, now),
            remote,
        )
        .await
    }

    async fn mutate_list<P, Fut, R>(&self, project: P, remote: Fut) -> Result<()>
    where
        P: FnOnce(&ListState<CaseRecord>, DateTime<Utc>) -> ListState<CaseRecord>,
        Fut: Future<Output = Result<R>>,
    {
        let params = self.inner.params.read().clone();
        let key = params.key();
        let loader_inner = Arc::clone(&self.inner);
        self.inner
            .list
            .mutate(self.inner.ctx.now(), key, project, remote, move |signal| async move {
                loader_inner.fetch_list(params, signal).await
            })
            .await
    }

    /// Project onto the matching list element and, after success, refresh
    /// the detail view if it shows the same case.
    async fn mutate_case<P, Fut, R>(
        &self,
        case_id: &RecordId,
        project: P,
        remote: Fut,
    ) -> Result<()>
    where
        P: Fn(&CaseRecord, DateTime<Utc>) -> CaseRecord,
        Fut: Future<Output = Result<R>>,
    {
        self.mutate_list(
            |list, now| {
                list.patched_where(|case| case.record_id() == case_id, |case| project(case, now))
            },
            remote,
        )
        .await?;

        let detail_open = self
            .inner
            .detail
            .data_cell()
            .with(|detail| detail.as_ref().is_some_and(|c| c.record_id() == case_id));
        if detail_open {
            self.open_case(case_id.as_str()).await;
        }
        Ok(())
    }

    // ─── State ───────────────────────────────────────────────

    /// Cases on the current page, placeholders included.
    pub fn cases(&self) -> Vec<CaseRecord> {
        self.inner.list.items()
    }

    /// Server total across all pages.
    pub fn total(&self) -> u64 {
        self.inner.list.total()
    }

    /// Active filter.
    pub fn filter(&self) -> CaseFilter {
        self.inner.params.read().filter.clone()
    }

    /// Current page request.
    pub fn page(&self) -> PageRequest {
        self.inner.params.read().page
    }

    /// The case opened with `open_case`, if any.
    pub fn open(&self) -> Option<CaseRecord> {
        self.inner.detail.data()
    }

    /// Whether a list fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.inner.list.resource().is_loading()
    }

    /// Whether a detail fetch is outstanding.
    pub fn is_detail_loading(&self) -> bool {
        self.inner.detail.is_loading()
    }

    /// Error from the last list fetch.
    pub fn error(&self) -> Option<CaseworkError> {
        self.inner.list.resource().error()
    }

    /// Error from the last detail fetch.
    pub fn detail_error(&self) -> Option<CaseworkError> {
        self.inner.detail.error()
    }

    /// Whether any mutation is in flight.
    pub fn is_mutating(&self) -> bool {
        self.inner.list.engine().is_mutating()
    }

    /// Subscribe to the case list.
    pub fn subscribe(&self) -> Subscription<Option<ListState<CaseRecord>>> {
        self.inner.list.resource().subscribe()
    }
}
