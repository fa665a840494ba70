//! List-shaped synchronizers: notes, cases and the worklist.
//!
//! Lists follow the same optimistic shape as single records, projected over
//! a [`ListState`]: create prepends a placeholder and bumps the total,
//! update patches the matching element, delete filters it out and drops the
//! total. Every mutation ends in a full list refetch, and every failure
//! restores the pre-mutation list.

mod cases;
mod notes;
mod worklist;

pub use cases::CasesSynchronizer;
pub use notes::NotesSynchronizer;
pub use worklist::{WorklistSnapshot, WorklistSynchronizer};

use chrono::{DateTime, Utc};
use std::future::Future;

use casework_core::effects::AbortSignal;
use casework_core::errors::Result;
use casework_core::types::{AnalystNote, CaseRecord, RecordId};

use crate::mutation::OptimisticEngine;
use crate::resource::Resource;
use crate::slot::ResourceKey;

// ============================================================================
// List State
// ============================================================================

/// Items plus the server's total count (which may exceed one page).
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    /// Current page, in server order.
    pub items: Vec<T>,
    /// Server-side count across every page.
    pub total: u64,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

impl<T> ListState<T> {
    /// List from one server page and the server's total.
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    /// Number of items held locally.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items are held locally.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Clone> ListState<T> {
    /// Copy with `item` first and the total incremented.
    pub fn prepended(&self, item: T) -> Self {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(item);
        items.extend(self.items.iter().cloned());
        Self {
            items,
            total: self.total + 1,
        }
    }

    /// Copy with every element matching `pred` replaced by `patch(element)`.
    pub fn patched_where(&self, pred: impl Fn(&T) -> bool, patch: impl Fn(&T) -> T) -> Self {
        Self {
            items: self
                .items
                .iter()
                .map(|item| if pred(item) { patch(item) } else { item.clone() })
                .collect(),
            total: self.total,
        }
    }

    /// Copy without elements matching `pred`; the total drops by the number
    /// removed.
    pub fn without(&self, pred: impl Fn(&T) -> bool) -> Self {
        let items: Vec<T> = self.items.iter().filter(|i| !pred(i)).cloned().collect();
        let removed = (self.items.len() - items.len()) as u64;
        Self {
            items,
            total: self.total.saturating_sub(removed),
        }
    }
}

/// List records addressed by [`RecordId`].
pub trait Identified {
    /// Stable id used to match list entries.
    fn record_id(&self) -> &RecordId;
}

impl Identified for AnalystNote {
    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl Identified for CaseRecord {
    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

// ============================================================================
// Shared List Plumbing
// ============================================================================

/// Fetch state and mutation engine sharing one list cell.
pub(crate) struct ListSync<T> {
    resource: Resource<ListState<T>>,
    engine: OptimisticEngine<Option<ListState<T>>>,
}

impl<T: Clone + Send + Sync + 'static> ListSync<T> {
    pub(crate) fn new(resource: Resource<ListState<T>>, entity: &str) -> Self {
        let engine = OptimisticEngine::new(entity, resource.data_cell().clone());
        Self { resource, engine }
    }

    pub(crate) fn resource(&self) -> &Resource<ListState<T>> {
        &self.resource
    }

    pub(crate) fn engine(&self) -> &OptimisticEngine<Option<ListState<T>>> {
        &self.engine
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.resource
            .data_cell()
            .with(|state| state.as_ref().map(|s| s.items.clone()).unwrap_or_default())
    }

    pub(crate) fn total(&self) -> u64 {
        self.resource
            .data_cell()
            .with(|state| state.as_ref().map_or(0, |s| s.total))
    }

    /// Optimistic list mutation ending in a refetch of `key`.
    ///
    /// A list never fetched projects from the empty list.
    pub(crate) async fn mutate<P, R, Fut, L, LFut>(
        &self,
        now: DateTime<Utc>,
        key: ResourceKey,
        project: P,
        remote: Fut,
        loader: L,
    ) -> Result<()>
    where
        P: FnOnce(&ListState<T>, DateTime<Utc>) -> ListState<T>,
        Fut: Future<Output = Result<R>>,
        L: FnOnce(AbortSignal) -> LFut,
        LFut: Future<Output = Result<ListState<T>>>,
    {
        self.resource.cancel_fetch();
        self.engine
            .run(
                now,
                |prev, now| match prev {
                    Some(list) => Some(project(list, now)),
                    None => Some(project(&ListState::default(), now)),
                },
                remote,
                |_| async move {
                    self.resource
                        .reconcile(key, loader)
                        .await
                        .map(|reconciled| reconciled.map(Some))
                },
            )
            .await
            .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_and_remove_track_total() {
        let list = ListState::new(vec![1, 2], 10);
        let grown = list.prepended(0);
        assert_eq!(grown.items, vec![0, 1, 2]);
        assert_eq!(grown.total, 11);

        let shrunk = grown.without(|i| *i == 1);
        assert_eq!(shrunk.items, vec![0, 2]);
        assert_eq!(shrunk.total, 10);
    }

    #[test]
    fn test_remove_missing_keeps_total() {
        let list = ListState::new(vec![1], 1);
        assert_eq!(list.without(|i| *i == 9), list);
    }

    #[test]
    fn test_patch_only_matching() {
        let list = ListState::new(vec![1, 2, 3], 3);
        let patched = list.patched_where(|i| *i == 2, |i| i * 10);
        assert_eq!(patched.items, vec![1, 20, 3]);
    }

    proptest::proptest! {
        #[test]
        fn test_prepend_then_remove_restores(
            items in proptest::collection::vec(0u32..100, 0..20),
            extra in 0u64..50,
        ) {
            let total = items.len() as u64 + extra;
            let list = ListState::new(items, total);
            let restored = list.prepended(1_000).without(|i| *i == 1_000);
            proptest::prop_assert_eq!(restored, list);
        }

        #[test]
        fn test_total_never_below_zero(
            items in proptest::collection::vec(0u32..5, 0..20),
            total in 0u64..5,
        ) {
            let shrunk = ListState::new(items.clone(), total).without(|i| *i < 3);
            let removed = items.iter().filter(|i| **i < 3).count() as u64;
            proptest::prop_assert_eq!(shrunk.total, total.saturating_sub(removed));
            proptest::prop_assert!(shrunk.items.iter().all(|i| *i >= 3));
        }
    }
}
