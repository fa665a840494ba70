//! Boundary decoders.
//!
//! The backend is inconsistent about envelopes: a record may arrive bare or
//! wrapped, a list may arrive as an array or as a paginated object whose
//! item and total keys vary by endpoint. Each decoder names the shapes it
//! accepts as an untagged union and canonicalizes to one domain value, so
//! nothing past this module inspects raw JSON.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use casework_core::errors::{CaseworkError, Result};
use casework_core::types::{TransactionReview, WorklistItem, WorklistStats};

use crate::collections::ListState;

// ============================================================================
// Records
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordShape<T> {
    Review { review: T },
    Data { data: T },
    Bare(T),
}

impl<T> RecordShape<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Review { review: inner } | Self::Data { data: inner } | Self::Bare(inner) => {
                inner
            }
        }
    }
}

/// Decode one record, bare or wrapped in `review` / `data`.
pub fn record<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value::<RecordShape<T>>(value)
        .map(RecordShape::into_inner)
        .map_err(|e| CaseworkError::serialization(format!("unexpected {what} response: {e}")))
}

/// Decode a transaction review.
pub fn review(value: Value) -> Result<TransactionReview> {
    record(value, "review")
}

/// Decode the worklist counters, bare or wrapped in `stats` / `data`.
pub fn worklist_stats(value: Value) -> Result<WorklistStats> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StatsShape {
        Stats { stats: WorklistStats },
        Data { data: WorklistStats },
        Bare(WorklistStats),
    }

    match serde_json::from_value::<StatsShape>(value) {
        Ok(
            StatsShape::Stats { stats }
            | StatsShape::Data { data: stats }
            | StatsShape::Bare(stats),
        ) => Ok(stats),
        Err(e) => Err(CaseworkError::serialization(format!(
            "unexpected worklist stats response: {e}"
        ))),
    }
}

/// Decode a claim response. An empty queue answers with no body, `null`, or
/// `{ "item": null }`.
pub fn claimed_item(value: Value) -> Result<Option<WorklistItem>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ClaimShape {
        Bare(WorklistItem),
        Item { item: Option<WorklistItem> },
        Data { data: Option<WorklistItem> },
    }

    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value::<ClaimShape>(value) {
        Ok(ClaimShape::Item { item } | ClaimShape::Data { data: item }) => Ok(item),
        Ok(ClaimShape::Bare(item)) => Ok(Some(item)),
        Err(e) => Err(CaseworkError::serialization(format!(
            "unexpected claim response: {e}"
        ))),
    }
}

// ============================================================================
// Lists
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum ListShape<T> {
    Bare(Vec<T>),
    Envelope(ListEnvelope<T>),
}

#[derive(Deserialize)]
struct ListEnvelope<T> {
    #[serde(
        alias = "data",
        alias = "results",
        alias = "notes",
        alias = "cases",
        alias = "worklist"
    )]
    items: Vec<T>,
    #[serde(default, alias = "total_count", alias = "count")]
    total: Option<u64>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct Pagination {
    #[serde(default, alias = "total_items", alias = "total_count")]
    total: Option<u64>,
}

/// Decode a list, bare or paginated. The total falls back to the item count.
pub fn list<T: DeserializeOwned>(value: Value, what: &str) -> Result<ListState<T>> {
    let shape = serde_json::from_value::<ListShape<T>>(value)
        .map_err(|e| CaseworkError::serialization(format!("unexpected {what} response: {e}")))?;
    let (items, total) = match shape {
        ListShape::Bare(items) => (items, None),
        ListShape::Envelope(envelope) => {
            let total = envelope
                .total
                .or_else(|| envelope.pagination.and_then(|p| p.total));
            (envelope.items, total)
        }
    };
    let total = total.unwrap_or(items.len() as u64);
    Ok(ListState::new(items, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_core::types::{AnalystNote, ReviewStatus};
    use casework_testkit::{note_json, review_json, worklist_item_json, worklist_stats_json};
    use serde_json::json;

    #[test]
    fn test_review_shapes_agree() {
        let bare = review_json("txn-1", "IN_REVIEW");
        let shapes = [
            bare.clone(),
            json!({ "review": bare.clone() }),
            json!({ "data": bare.clone() }),
        ];
        let decoded: Vec<_> = shapes.into_iter().map(|v| review(v).unwrap()).collect();
        assert!(decoded.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(decoded[0].status, ReviewStatus::InReview);
    }

    #[test]
    fn test_review_rejects_garbage() {
        let err = review(json!({ "status": 3 })).unwrap_err();
        assert!(matches!(err, CaseworkError::Serialization { .. }));
    }

    #[test]
    fn test_list_shapes_agree() {
        let notes = vec![
            note_json("n-1", "txn-1", "a-1", "first"),
            note_json("n-2", "txn-1", "a-2", "second"),
        ];
        let shapes = [
            json!(notes.clone()),
            json!({ "items": notes.clone(), "total": 2 }),
            json!({ "notes": notes.clone() }),
            json!({ "data": notes.clone(), "pagination": { "total_items": 2 } }),
        ];
        for shape in shapes {
            let state: ListState<AnalystNote> = list(shape, "notes").unwrap();
            assert_eq!(state.items.len(), 2);
            assert_eq!(state.total, 2);
        }
    }

    #[test]
    fn test_list_total_prefers_server_count() {
        let page = json!({ "cases": [], "total_count": 40 });
        let state: ListState<serde_json::Value> = list(page, "cases").unwrap();
        assert!(state.items.is_empty());
        assert_eq!(state.total, 40);
    }

    #[test]
    fn test_stats_shapes() {
        let stats = worklist_stats_json(10, 4, 2);
        assert_eq!(
            worklist_stats(json!({ "stats": stats.clone() })).unwrap(),
            worklist_stats(stats).unwrap()
        );
    }

    #[test]
    fn test_claim_shapes() {
        assert_eq!(claimed_item(Value::Null).unwrap(), None);
        assert_eq!(claimed_item(json!({ "item": null })).unwrap(), None);

        let item = worklist_item_json("w-1", "HIGH", Some("a-1"));
        let bare = claimed_item(item.clone()).unwrap().unwrap();
        let wrapped = claimed_item(json!({ "item": item })).unwrap().unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare.assigned_analyst_id.as_deref(), Some("a-1"));
    }
}
