//! Analyst notes on one transaction.

use std::sync::Arc;

use casework_core::effects::{AbortSignal, Method};
use casework_core::errors::{CaseworkError, Result};
use casework_core::reactive::Subscription;
use casework_core::types::{
    AnalystNote, CreateNoteRequest, NoteAuthor, RecordId, UpdateNoteRequest,
};

use super::{Identified, ListState, ListSync};
use crate::context::SyncContext;
use crate::decode;
use crate::resource::{FetchOutcome, Resource};
use crate::slot::ResourceKey;

/// Note list for a transaction, with optimistic create/update/delete.
#[derive(Clone)]
pub struct NotesSynchronizer {
    inner: Arc<NotesInner>,
}

struct NotesInner {
    ctx: SyncContext,
    transaction_id: String,
    author: NoteAuthor,
    list: ListSync<AnalystNote>,
}

impl NotesInner {
    fn key(&self) -> ResourceKey {
        ResourceKey::new(self.transaction_id.as_str())
    }

    async fn fetch_list(&self, signal: AbortSignal) -> Result<ListState<AnalystNote>> {
        let path = self.ctx.paths().notes(&self.transaction_id);
        let body = self.ctx.fetch(&path, &signal, "Failed to fetch notes").await?;
        decode::list(body, "notes")
    }
}

impl NotesSynchronizer {
    /// Notes for `transaction_id`, created as `author`.
    pub fn new(ctx: SyncContext, transaction_id: impl Into<String>, author: NoteAuthor) -> Self {
        Self {
            inner: Arc::new(NotesInner {
                ctx,
                transaction_id: transaction_id.into(),
                author,
                list: ListSync::new(Resource::new("notes"), "notes"),
            }),
        }
    }

    /// Fetch the note list, superseding any fetch in flight.
    pub async fn fetch(&self) -> FetchOutcome {
        let inner = Arc::clone(&self.inner);
        self.inner
            .list
            .resource()
            .load(self.inner.key(), move |signal| async move {
                inner.fetch_list(signal).await
            })
            .await
    }

    /// Cancel in-flight fetches. Pending mutations still settle.
    pub fn dispose(&self) {
        self.inner.list.resource().cancel();
    }

    /// Create a note. A placeholder with a local id heads the list until
    /// the refetch replaces it.
    pub async fn create(&self, request: CreateNoteRequest) -> Result<()> {
        if request.note_content.trim().is_empty() {
            return Err(CaseworkError::invalid("note content must not be empty"));
        }
        let inner = &self.inner;
        let now = inner.ctx.now();
        let placeholder_id = RecordId::local_from_timestamp(
            &inner.ctx.collections().placeholder_prefix,
            inner.ctx.timestamp_ms(),
        );
        let placeholder = AnalystNote::placeholder(
            placeholder_id,
            &inner.transaction_id,
            &inner.author,
            &request,
            now,
        );
        tracing::info!(
            transaction_id = %inner.transaction_id,
            note_type = ?request.note_type,
            "creating note"
        );

        let path = inner.ctx.paths().notes(&inner.transaction_id);
        let remote = inner
            .ctx
            .send(Method::Post, &path, &request, "Failed to create note");
        let loader_inner = Arc::clone(inner);
        inner
            .list
            .mutate(
                now,
                inner.key(),
                move |list, _| list.prepended(placeholder),
                remote,
                move |signal| async move { loader_inner.fetch_list(signal).await },
            )
            .await
    }

    /// Edit a note. Ownership is never part of the update.
    pub async fn update(&self, note_id: &RecordId, request: UpdateNoteRequest) -> Result<()> {
        let server_id = note_id.require_confirmed()?;
        let inner = &self.inner;
        let now = inner.ctx.now();
        let path = inner.ctx.paths().note(&inner.transaction_id, server_id);
        let remote = inner
            .ctx
            .send(Method::Patch, &path, &request, "Failed to update note");
        let loader_inner = Arc::clone(inner);
        inner
            .list
            .mutate(
                now,
                inner.key(),
                |list, now| {
                    list.patched_where(
                        |note| note.record_id() == note_id,
                        |note| note.patched(&request, now),
                    )
                },
                remote,
                move |signal| async move { loader_inner.fetch_list(signal).await },
            )
            .await
    }

    /// Delete a note.
    pub async fn delete(&self, note_id: &RecordId) -> Result<()> {
        let server_id = note_id.require_confirmed()?;
        let inner = &self.inner;
        let now = inner.ctx.now();
        let path = inner.ctx.paths().note(&inner.transaction_id, server_id);
        let remote = inner
            .ctx
            .call(Method::Delete, &path, None, None, "Failed to delete note");
        let loader_inner = Arc::clone(inner);
        inner
            .list
            .mutate(
                now,
                inner.key(),
                |list, _| list.without(|note| note.record_id() == note_id),
                remote,
                move |signal| async move { loader_inner.fetch_list(signal).await },
            )
            .await
    }

    // ─── State ───────────────────────────────────────────────

    /// Transaction whose notes these are.
    pub fn transaction_id(&self) -> &str {
        &self.inner.transaction_id
    }

    /// Notes in display order, placeholders included.
    pub fn notes(&self) -> Vec<AnalystNote> {
        self.inner.list.items()
    }

    /// Server total.
    pub fn total(&self) -> u64 {
        self.inner.list.total()
    }

    /// Whether a fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.inner.list.resource().is_loading()
    }

    /// Error from the last fetch.
    pub fn error(&self) -> Option<CaseworkError> {
        self.inner.list.resource().error()
    }

    /// Whether any note mutation is in flight.
    pub fn is_mutating(&self) -> bool {
        self.inner.list.engine().is_mutating()
    }

    /// Subscribe to the note list.
    pub fn subscribe(&self) -> Subscription<Option<ListState<AnalystNote>>> {
        self.inner.list.resource().subscribe()
    }
}
