//! Analyst worklist: the queue of transactions awaiting review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::case::Priority;
use super::review::ReviewStatus;

/// One queued transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorklistItem {
    /// Queue entry id.
    pub id: String,
    /// Transaction awaiting review.
    pub transaction_id: String,
    /// Queue priority.
    #[serde(default)]
    pub priority: Priority,
    /// Model risk score, when scored.
    #[serde(default)]
    pub risk_score: Option<f64>,
    /// Status of the underlying review.
    #[serde(alias = "status")]
    pub review_status: ReviewStatus,
    /// Analyst who claimed the item.
    #[serde(default)]
    pub assigned_analyst_id: Option<String>,
    /// When the item entered the queue.
    pub queued_at: DateTime<Utc>,
    /// When the item was claimed.
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl WorklistItem {
    /// Whether nobody has claimed this item.
    pub fn is_unassigned(&self) -> bool {
        self.assigned_analyst_id.is_none()
    }

    /// Optimistic result of a claim.
    pub fn claimed_by(&self, analyst_id: &str, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.assigned_analyst_id = Some(analyst_id.to_string());
        next.review_status = ReviewStatus::InReview;
        next.claimed_at = Some(now);
        next
    }
}

/// Aggregate counters for the worklist header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklistStats {
    /// Items in the queue.
    #[serde(default)]
    pub total: u64,
    /// Items nobody has claimed.
    #[serde(default)]
    pub unassigned: u64,
    /// Items claimed by the caller.
    #[serde(default)]
    pub assigned_to_me: u64,
    /// Item counts keyed by priority.
    #[serde(default)]
    pub by_priority: BTreeMap<Priority, u64>,
}

impl WorklistStats {
    /// Optimistic counters after the caller claims one unassigned item.
    pub fn after_claim(&self) -> Self {
        let mut next = self.clone();
        next.unassigned = next.unassigned.saturating_sub(1);
        next.assigned_to_me += 1;
        next
    }
}

/// Query filters for the worklist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WorklistFilter {
    /// Only this priority.
    pub priority: Option<Priority>,
    /// Only this review status.
    pub status: Option<ReviewStatus>,
    /// Only items claimed by the caller.
    pub assigned_to_me: bool,
}

impl WorklistFilter {
    /// Query parameters in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if self.assigned_to_me {
            pairs.push(("assigned_to_me", "true".to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_after_claim_saturates() {
        let stats = WorklistStats::default().after_claim();
        assert_eq!(stats.unassigned, 0);
        assert_eq!(stats.assigned_to_me, 1);
    }

    #[test]
    fn test_stats_decode_priority_map() {
        let stats: WorklistStats = serde_json::from_value(serde_json::json!({
            "total": 4,
            "unassigned": 3,
            "by_priority": { "HIGH": 1, "LOW": 3 }
        }))
        .unwrap();
        assert_eq!(stats.by_priority.get(&Priority::High), Some(&1));
        assert_eq!(stats.assigned_to_me, 0);
    }
}
