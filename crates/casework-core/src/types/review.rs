//! Transaction review record and its status machine.
//!
//! The transition table here is advisory on the client: synchronizers still
//! attempt transitions it calls illegal and let the server decide, but views
//! use it (together with capabilities) to decide which actions to offer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CaseworkError;

// ============================================================================
// Status Machine
// ============================================================================

/// Workflow status of a transaction review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    /// Awaiting an analyst
    #[serde(alias = "pending")]
    Pending,
    /// Assigned and being worked
    #[serde(alias = "in_review")]
    InReview,
    /// Handed to a supervisor
    #[serde(alias = "escalated")]
    Escalated,
    /// Decision recorded
    #[serde(alias = "resolved")]
    Resolved,
    /// Finalized; no further transitions
    #[serde(alias = "closed")]
    Closed,
}

impl ReviewStatus {
    /// Every status, in workflow order.
    pub const ALL: [ReviewStatus; 5] = [
        Self::Pending,
        Self::InReview,
        Self::Escalated,
        Self::Resolved,
        Self::Closed,
    ];

    /// `CLOSED` has no outbound transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether `self → next` is in the legal transition table.
    ///
    /// Any non-terminal status may move to `IN_REVIEW` (re-assignment);
    /// the remaining edges are `IN_REVIEW → ESCALATED`,
    /// `IN_REVIEW | ESCALATED → RESOLVED` and `RESOLVED → CLOSED`.
    pub fn can_transition_to(self, next: ReviewStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Self::InReview)
                | (Self::InReview, Self::Escalated)
                | (Self::InReview | Self::Escalated, Self::Resolved)
                | (Self::Resolved, Self::Closed)
        )
    }

    /// Statuses reachable from `self` in one legal step.
    pub fn legal_targets(self) -> Vec<ReviewStatus> {
        Self::ALL
            .into_iter()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InReview => "IN_REVIEW",
            Self::Escalated => "ESCALATED",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = CaseworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| CaseworkError::invalid(format!("unknown review status '{s}'")))
    }
}

/// Named workflow actions on a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewAction {
    /// Take (or re-take) ownership; moves to `IN_REVIEW`
    Assign,
    /// Hand to a supervisor; moves to `ESCALATED`
    Escalate,
    /// Record a decision; moves to `RESOLVED`
    Resolve,
    /// Close a resolved review; moves to `CLOSED`
    Finalize,
}

impl ReviewAction {
    /// Every action.
    pub const ALL: [ReviewAction; 4] = [
        Self::Assign,
        Self::Escalate,
        Self::Resolve,
        Self::Finalize,
    ];

    /// Status the action moves a review into.
    pub fn target(self) -> ReviewStatus {
        match self {
            Self::Assign => ReviewStatus::InReview,
            Self::Escalate => ReviewStatus::Escalated,
            Self::Resolve => ReviewStatus::Resolved,
            Self::Finalize => ReviewStatus::Closed,
        }
    }

    /// Whether the action is a legal edge from `from`.
    pub fn is_legal_from(self, from: ReviewStatus) -> bool {
        from.can_transition_to(self.target())
    }

    /// Short label for logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Escalate => "escalate",
            Self::Resolve => "resolve",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Review Record
// ============================================================================

/// Analyst workflow record, one per transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReview {
    /// Server id of the review record.
    pub id: String,
    /// Transaction under review.
    pub transaction_id: String,
    /// Workflow status.
    pub status: ReviewStatus,

    /// Analyst holding the review.
    #[serde(default)]
    pub assigned_analyst_id: Option<String>,
    /// Display name of the assignee.
    #[serde(default)]
    pub assigned_analyst_name: Option<String>,
    /// When the current assignment was made.
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,

    /// Outcome code, once resolved.
    #[serde(default)]
    pub resolution_code: Option<String>,
    /// Free-form resolution remarks.
    #[serde(default)]
    pub resolution_notes: Option<String>,
    /// Analyst verdict on the transaction.
    #[serde(default)]
    pub analyst_decision: Option<String>,
    /// Reasoning behind the verdict.
    #[serde(default)]
    pub analyst_decision_reason: Option<String>,
    /// When the resolution was recorded.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,

    /// When the review was escalated.
    #[serde(default)]
    pub escalated_at: Option<DateTime<Utc>>,
    /// Supervisor it was escalated to.
    #[serde(default)]
    pub escalated_to: Option<String>,
    /// Why it was escalated.
    #[serde(default)]
    pub escalation_reason: Option<String>,

    /// Latest analyst activity.
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST …/review/assign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRequest {
    /// Analyst taking the review.
    pub analyst_id: String,
    /// Display name stored with the assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_name: Option<String>,
}

/// Body of `PATCH …/review/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    /// Target status.
    pub status: ReviewStatus,
}

/// Body of `POST …/review/resolve`.
///
/// Omitted optional fields leave the stored values untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Outcome code.
    pub resolution_code: String,
    /// Free-form remarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    /// Analyst verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_decision: Option<String>,
    /// Reasoning behind the verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyst_decision_reason: Option<String>,
}

impl ResolveRequest {
    /// Resolution with only a code.
    pub fn new(resolution_code: impl Into<String>) -> Self {
        Self {
            resolution_code: resolution_code.into(),
            ..Self::default()
        }
    }

    /// Attach resolution notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.resolution_notes = Some(notes.into());
        self
    }

    /// Attach an analyst decision and its reason.
    pub fn with_decision(
        mut self,
        decision: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        self.analyst_decision = Some(decision.into());
        self.analyst_decision_reason = reason;
        self
    }
}

/// Body of `POST …/review/escalate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalateRequest {
    /// Why the review needs a supervisor.
    pub escalation_reason: String,
    /// Supervisor to hand to; the server picks one when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalate_to: Option<String>,
}

// ─── Projections ─────────────────────────────────────────────

impl TransactionReview {
    /// Optimistic result of `assign`.
    pub fn assigned(&self, request: &AssignRequest, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = ReviewStatus::InReview;
        next.assigned_analyst_id = Some(request.analyst_id.clone());
        if request.analyst_name.is_some() {
            next.assigned_analyst_name = request.analyst_name.clone();
        }
        next.assigned_at = Some(now);
        next.touch(now);
        next
    }

    /// Optimistic result of a generic status update.
    pub fn with_status(&self, status: ReviewStatus, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.touch(now);
        next
    }

    /// Optimistic result of `resolve`.
    pub fn resolved(&self, request: &ResolveRequest, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = ReviewStatus::Resolved;
        next.resolution_code = Some(request.resolution_code.clone());
        merge_defined(&mut next.resolution_notes, &request.resolution_notes);
        merge_defined(&mut next.analyst_decision, &request.analyst_decision);
        merge_defined(
            &mut next.analyst_decision_reason,
            &request.analyst_decision_reason,
        );
        next.resolved_at = Some(now);
        next.touch(now);
        next
    }

    /// Optimistic result of `escalate`.
    ///
    /// `escalated_to` is only projected when the caller named a target.
    pub fn escalated(&self, request: &EscalateRequest, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = ReviewStatus::Escalated;
        next.escalation_reason = Some(request.escalation_reason.clone());
        merge_defined(&mut next.escalated_to, &request.escalate_to);
        next.escalated_at = Some(now);
        next.touch(now);
        next
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
        self.last_activity_at = Some(self.last_activity_at.map_or(now, |prev| prev.max(now)));
    }
}

fn merge_defined(slot: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming {
        *slot = Some(value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap()
    }

    fn review(status: ReviewStatus) -> TransactionReview {
        TransactionReview {
            id: "rev-1".into(),
            transaction_id: "txn-1".into(),
            status,
            assigned_analyst_id: None,
            assigned_analyst_name: None,
            assigned_at: None,
            resolution_code: None,
            resolution_notes: Some("prior notes".into()),
            analyst_decision: None,
            analyst_decision_reason: None,
            resolved_at: None,
            escalated_at: None,
            escalated_to: None,
            escalation_reason: None,
            last_activity_at: None,
            created_at: at(0),
            updated_at: at(10),
        }
    }

    #[test]
    fn test_legal_table() {
        use ReviewStatus::*;
        assert!(Pending.can_transition_to(InReview));
        assert!(InReview.can_transition_to(Escalated));
        assert!(InReview.can_transition_to(Resolved));
        assert!(Escalated.can_transition_to(Resolved));
        assert!(Resolved.can_transition_to(Closed));
        assert!(Resolved.can_transition_to(InReview));

        assert!(!Pending.can_transition_to(Resolved));
        assert!(!Pending.can_transition_to(Escalated));
        assert!(!Escalated.can_transition_to(Closed));
        assert!(!Resolved.can_transition_to(Resolved));
        assert!(Closed.legal_targets().is_empty());
    }

    #[test]
    fn test_action_targets() {
        assert!(ReviewAction::Assign.is_legal_from(ReviewStatus::Escalated));
        assert!(!ReviewAction::Assign.is_legal_from(ReviewStatus::Closed));
        assert!(!ReviewAction::Escalate.is_legal_from(ReviewStatus::Escalated));
        assert!(ReviewAction::Finalize.is_legal_from(ReviewStatus::Resolved));
    }

    #[test]
    fn test_status_parsing_is_lenient() {
        assert_eq!("in-review".parse::<ReviewStatus>().unwrap(), ReviewStatus::InReview);
        assert_eq!("CLOSED".parse::<ReviewStatus>().unwrap(), ReviewStatus::Closed);
        assert!("archived".parse::<ReviewStatus>().is_err());

        let lower: ReviewStatus = serde_json::from_str("\"escalated\"").unwrap();
        assert_eq!(lower, ReviewStatus::Escalated);
    }

    #[test]
    fn test_resolve_merges_only_defined_fields() {
        let prev = review(ReviewStatus::InReview);
        let next = prev.resolved(&ResolveRequest::new("FRAUD_CONFIRMED"), at(20));

        assert_eq!(next.status, ReviewStatus::Resolved);
        assert_eq!(next.resolution_code.as_deref(), Some("FRAUD_CONFIRMED"));
        assert_eq!(next.resolution_notes.as_deref(), Some("prior notes"));
        assert_eq!(next.resolved_at, Some(at(20)));
    }

    #[test]
    fn test_escalate_without_target_keeps_existing() {
        let prev = review(ReviewStatus::InReview);
        let next = prev.escalated(
            &EscalateRequest {
                escalation_reason: "velocity spike".into(),
                escalate_to: None,
            },
            at(30),
        );
        assert_eq!(next.status, ReviewStatus::Escalated);
        assert_eq!(next.escalated_to, None);
        assert_eq!(next.escalated_at, Some(at(30)));
    }

    #[test]
    fn test_timestamps_never_move_backward() {
        let prev = review(ReviewStatus::Pending);
        let next = prev.assigned(
            &AssignRequest {
                analyst_id: "a-1".into(),
                analyst_name: Some("Ada".into()),
            },
            at(5),
        );
        assert_eq!(next.updated_at, at(10));
        assert_eq!(next.last_activity_at, Some(at(5)));
        assert_eq!(next.assigned_analyst_name.as_deref(), Some("Ada"));
    }

    fn any_status() -> impl Strategy<Value = ReviewStatus> {
        prop::sample::select(ReviewStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn closed_is_terminal(next in any_status()) {
            prop_assert!(!ReviewStatus::Closed.can_transition_to(next));
        }

        #[test]
        fn reassign_allowed_from_every_open_status(from in any_status()) {
            prop_assert_eq!(
                from.can_transition_to(ReviewStatus::InReview),
                !from.is_terminal()
            );
        }

        #[test]
        fn projections_keep_identity(from in any_status(), minute in 0u32..59) {
            let prev = review(from);
            let next = prev.with_status(ReviewStatus::InReview, at(minute));
            prop_assert_eq!(&next.id, &prev.id);
            prop_assert_eq!(&next.transaction_id, &prev.transaction_id);
            prop_assert!(next.updated_at >= prev.updated_at);
        }
    }
}
