//! Wire-shaped JSON fixtures.
//!
//! Fixtures build the JSON the server returns rather than domain structs, so
//! tests exercise the boundary decoders too.

use serde_json::{json, Value};

/// Base path used by the default configuration.
pub const API_BASE: &str = "/api/v1";

/// Timestamp shared by fixtures that do not care about time.
pub const FIXTURE_TIME: &str = "2024-06-01T11:00:00Z";

/// Full path under [`API_BASE`].
pub fn api(path: &str) -> String {
    format!("{API_BASE}{path}")
}

/// Review record for `transaction_id` in `status`.
pub fn review_json(transaction_id: &str, status: &str) -> Value {
    json!({
        "id": format!("rev-{transaction_id}"),
        "transaction_id": transaction_id,
        "status": status,
        "assigned_analyst_id": null,
        "created_at": FIXTURE_TIME,
        "updated_at": FIXTURE_TIME
    })
}

/// Review record assigned to `analyst_id`.
pub fn assigned_review_json(transaction_id: &str, analyst_id: &str) -> Value {
    let mut review = review_json(transaction_id, "IN_REVIEW");
    review["assigned_analyst_id"] = json!(analyst_id);
    review["assigned_at"] = json!(FIXTURE_TIME);
    review
}

/// Note record.
pub fn note_json(id: &str, transaction_id: &str, analyst_id: &str, content: &str) -> Value {
    json!({
        "id": id,
        "transaction_id": transaction_id,
        "analyst_id": analyst_id,
        "note_type": "GENERAL",
        "note_content": content,
        "is_private": false,
        "created_at": FIXTURE_TIME,
        "updated_at": FIXTURE_TIME
    })
}

/// Case record.
pub fn case_json(id: &str, title: &str, transaction_ids: &[&str]) -> Value {
    json!({
        "id": id,
        "case_number": format!("CASE-{id}"),
        "title": title,
        "status": "OPEN",
        "priority": "MEDIUM",
        "transaction_ids": transaction_ids,
        "created_by": "analyst-1",
        "created_at": FIXTURE_TIME,
        "updated_at": FIXTURE_TIME
    })
}

/// Worklist item; `assigned_to` of `None` leaves it unclaimed.
pub fn worklist_item_json(id: &str, priority: &str, assigned_to: Option<&str>) -> Value {
    json!({
        "id": id,
        "transaction_id": format!("txn-{id}"),
        "priority": priority,
        "risk_score": 72.5,
        "review_status": if assigned_to.is_some() { "IN_REVIEW" } else { "PENDING" },
        "assigned_analyst_id": assigned_to,
        "queued_at": FIXTURE_TIME
    })
}

/// Worklist counters.
pub fn worklist_stats_json(total: u64, unassigned: u64, assigned_to_me: u64) -> Value {
    json!({
        "total": total,
        "unassigned": unassigned,
        "assigned_to_me": assigned_to_me,
        "by_priority": {}
    })
}

/// Paginated envelope `{ items, total, page, page_size }`.
pub fn page_json(items: Vec<Value>, total: u64) -> Value {
    let page_size = items.len().max(1);
    json!({
        "items": items,
        "total": total,
        "page": 1,
        "page_size": page_size
    })
}

/// Scope endpoint reply in the `{ scopes: [...] }` shape.
pub fn scopes_json(scopes: &[&str]) -> Value {
    json!({ "scopes": scopes })
}
