//! Investigation cases grouping one or more transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::record_id::RecordId;

/// Urgency shared by cases and worklist items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Routine.
    #[serde(alias = "low")]
    Low,
    /// Default for new cases.
    #[default]
    #[serde(alias = "medium")]
    Medium,
    /// Needs attention today.
    #[serde(alias = "high")]
    High,
    /// Drop everything.
    #[serde(alias = "critical")]
    Critical,
}

impl Priority {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    /// Newly opened, not yet worked.
    #[default]
    #[serde(alias = "open")]
    Open,
    /// An analyst is gathering evidence.
    #[serde(alias = "investigating")]
    Investigating,
    /// Waiting on a supervisor.
    #[serde(alias = "pending_review")]
    PendingReview,
    /// A resolution code has been recorded.
    #[serde(alias = "resolved")]
    Resolved,
    /// Archived; no further changes.
    #[serde(alias = "closed")]
    Closed,
}

impl CaseStatus {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Investigating => "INVESTIGATING",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
        }
    }
}

/// A fraud investigation case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Server id, or a placeholder while the create is in flight.
    pub id: RecordId,
    /// Human-facing number assigned by the server.
    #[serde(default)]
    pub case_number: Option<String>,
    /// Short summary.
    pub title: String,
    /// Free-form details.
    #[serde(default)]
    pub description: Option<String>,
    /// Workflow status.
    #[serde(default)]
    pub status: CaseStatus,
    /// Triage priority.
    #[serde(default)]
    pub priority: Priority,
    /// Analyst currently working the case.
    #[serde(default)]
    pub assigned_analyst_id: Option<String>,
    /// Linked transactions, in link order.
    #[serde(default)]
    pub transaction_ids: Vec<String>,
    /// Set when the case is resolved.
    #[serde(default)]
    pub resolution_code: Option<String>,
    /// Free-form resolution remarks.
    #[serde(default)]
    pub resolution_notes: Option<String>,
    /// When the resolution was recorded.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Analyst who opened the case.
    #[serde(alias = "analyst_id")]
    pub created_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /cases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCaseRequest {
    /// Short summary.
    pub title: String,
    /// Free-form details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initial priority.
    #[serde(default)]
    pub priority: Priority,
    /// Transactions to link on creation.
    #[serde(default)]
    pub transaction_ids: Vec<String>,
}

/// Body of `PATCH /cases/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCaseRequest {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CaseStatus>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_analyst_id: Option<String>,
}

/// Body of `POST /cases/{id}/resolve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveCaseRequest {
    /// Outcome code.
    pub resolution_code: String,
    /// Free-form remarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
}

/// Query filters for the case list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CaseFilter {
    /// Only cases in this status.
    pub status: Option<CaseStatus>,
    /// Only cases at this priority.
    pub priority: Option<Priority>,
    /// Only cases assigned to this analyst.
    pub assigned_analyst_id: Option<String>,
    /// Server-side text search.
    pub search: Option<String>,
}

impl CaseFilter {
    /// Query parameters in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        if let Some(analyst) = &self.assigned_analyst_id {
            pairs.push(("assigned_analyst_id", analyst.clone()));
        }
        if let Some(search) = self.search.as_ref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search", search.trim().to_string()));
        }
        pairs
    }
}

// ─── Projections ─────────────────────────────────────────────

impl CaseRecord {
    /// Placeholder shown while a create is in flight.
    pub fn placeholder(
        id: RecordId,
        created_by: &str,
        request: &CreateCaseRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            case_number: None,
            title: request.title.clone(),
            description: request.description.clone(),
            status: CaseStatus::Open,
            priority: request.priority,
            assigned_analyst_id: None,
            transaction_ids: request.transaction_ids.clone(),
            resolution_code: None,
            resolution_notes: None,
            resolved_at: None,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Optimistic result of an update.
    pub fn patched(&self, request: &UpdateCaseRequest, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(title) = &request.title {
            next.title = title.clone();
        }
        if request.description.is_some() {
            next.description = request.description.clone();
        }
        if let Some(status) = request.status {
            next.status = status;
        }
        if let Some(priority) = request.priority {
            next.priority = priority;
        }
        if request.assigned_analyst_id.is_some() {
            next.assigned_analyst_id = request.assigned_analyst_id.clone();
        }
        next.updated_at = next.updated_at.max(now);
        next
    }

    /// Optimistic result of a resolve.
    pub fn resolved(&self, request: &ResolveCaseRequest, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = CaseStatus::Resolved;
        next.resolution_code = Some(request.resolution_code.clone());
        if request.resolution_notes.is_some() {
            next.resolution_notes = request.resolution_notes.clone();
        }
        next.resolved_at = Some(now);
        next.updated_at = next.updated_at.max(now);
        next
    }

    /// Optimistic result of linking a transaction. Linking twice is a no-op.
    pub fn with_transaction(&self, transaction_id: &str, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if !next.transaction_ids.iter().any(|t| t == transaction_id) {
            next.transaction_ids.push(transaction_id.to_string());
        }
        next.updated_at = next.updated_at.max(now);
        next
    }

    /// Optimistic result of unlinking a transaction.
    pub fn without_transaction(&self, transaction_id: &str, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.transaction_ids.retain(|t| t != transaction_id);
        next.updated_at = next.updated_at.max(now);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn case() -> CaseRecord {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        CaseRecord::placeholder(
            RecordId::confirmed("case-1"),
            "analyst-1",
            &CreateCaseRequest {
                title: "Card testing ring".into(),
                description: None,
                priority: Priority::High,
                transaction_ids: vec!["txn-1".into()],
            },
            now,
        )
    }

    #[test]
    fn test_transaction_links_are_a_set() {
        let now = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
        let linked = case().with_transaction("txn-1", now).with_transaction("txn-2", now);
        assert_eq!(linked.transaction_ids, vec!["txn-1", "txn-2"]);

        let unlinked = linked.without_transaction("txn-1", now);
        assert_eq!(unlinked.transaction_ids, vec!["txn-2"]);
    }

    #[test]
    fn test_filter_query_pairs_skip_blank_search() {
        let filter = CaseFilter {
            status: Some(CaseStatus::PendingReview),
            search: Some("   ".into()),
            ..CaseFilter::default()
        };
        assert_eq!(
            filter.query_pairs(),
            vec![("status", "PENDING_REVIEW".to_string())]
        );
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::Low < Priority::Medium);
    }
}
