//! Which review actions a view should offer.
//!
//! An action is offered when the review status machine allows it from the
//! current status and the user holds a capability that covers it.

use casework_core::errors::{CaseworkError, Result};
use casework_core::types::{ReviewAction, ReviewStatus};

use crate::capabilities::{Capabilities, Capability};

/// Capabilities that each permit `action`; holding any one is enough.
pub fn permitting(action: ReviewAction) -> &'static [Capability] {
    match action {
        ReviewAction::Assign => &[Capability::ReviewTransactions, Capability::AssignReviews],
        ReviewAction::Escalate | ReviewAction::Resolve => &[Capability::ReviewTransactions],
        ReviewAction::Finalize => &[Capability::AssignReviews],
    }
}

/// Whether `caps` permits `action`, ignoring the status machine.
pub fn permits(caps: &Capabilities, action: ReviewAction) -> bool {
    permitting(action).iter().any(|c| caps.has(*c))
}

/// Actions that are both legal from `status` and permitted by `caps`.
pub fn allowed_review_actions(status: ReviewStatus, caps: &Capabilities) -> Vec<ReviewAction> {
    ReviewAction::ALL
        .into_iter()
        .filter(|action| action.is_legal_from(status) && permits(caps, *action))
        .collect()
}

/// `PermissionDenied` unless `caps` grants `capability`.
pub fn require(caps: &Capabilities, capability: Capability) -> Result<()> {
    if caps.has(capability) {
        Ok(())
    } else {
        Err(CaseworkError::permission_denied(format!(
            "{capability} is required"
        )))
    }
}

/// `PermissionDenied` unless `caps` permits `action`.
pub fn require_action(caps: &Capabilities, action: ReviewAction) -> Result<()> {
    if permits(caps, action) {
        Ok(())
    } else {
        Err(CaseworkError::permission_denied(format!(
            "{action} requires one of: {}",
            permitting(action)
                .iter()
                .map(|c| c.label())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::SystemRole;
    use assert_matches::assert_matches;

    #[test]
    fn test_analyst_actions_follow_status() {
        let analyst = Capabilities::for_role_expanded(SystemRole::FraudAnalyst);
        assert_eq!(
            allowed_review_actions(ReviewStatus::InReview, &analyst),
            vec![ReviewAction::Assign, ReviewAction::Escalate, ReviewAction::Resolve]
        );
        assert_eq!(
            allowed_review_actions(ReviewStatus::Resolved, &analyst),
            vec![ReviewAction::Assign]
        );
        assert!(allowed_review_actions(ReviewStatus::Closed, &analyst).is_empty());
    }

    #[test]
    fn test_only_supervisors_finalize() {
        let supervisor = Capabilities::for_role_expanded(SystemRole::FraudSupervisor);
        let analyst = Capabilities::for_role_expanded(SystemRole::FraudAnalyst);
        assert!(allowed_review_actions(ReviewStatus::Resolved, &supervisor)
            .contains(&ReviewAction::Finalize));
        assert_matches!(
            require_action(&analyst, ReviewAction::Finalize),
            Err(CaseworkError::PermissionDenied { .. })
        );
    }

    #[test]
    fn test_rule_roles_get_no_review_actions() {
        let maker = Capabilities::for_role_expanded(SystemRole::RuleMaker);
        assert!(allowed_review_actions(ReviewStatus::Pending, &maker).is_empty());
        assert!(require(&maker, Capability::ReadRules).is_ok());
        assert!(require(&maker, Capability::ApproveRules).is_err());
    }
}
