//! Derived capability flags.
//!
//! [`Capabilities`] is never stored as a source of truth; the resolver
//! recomputes it from scopes, roles and the active role. Merging is a plain
//! OR, so combining grants can only ever add capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

use crate::role::SystemRole;

/// One capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Browse fraud rules.
    ReadRules,
    /// Draft new rules.
    CreateRules,
    /// Modify existing rules.
    EditRules,
    /// Approve rule changes (maker/checker).
    ApproveRules,
    /// Work transaction reviews.
    ReviewTransactions,
    /// Open, update and resolve cases.
    ManageCases,
    /// Assign reviews to other analysts.
    AssignReviews,
    /// Read reports.
    ViewReports,
    /// Administer users.
    ManageUsers,
    /// Read the audit log.
    ViewAuditLog,
}

impl Capability {
    /// Every capability.
    pub const ALL: [Capability; 10] = [
        Self::ReadRules,
        Self::CreateRules,
        Self::EditRules,
        Self::ApproveRules,
        Self::ReviewTransactions,
        Self::ManageCases,
        Self::AssignReviews,
        Self::ViewReports,
        Self::ManageUsers,
        Self::ViewAuditLog,
    ];

    /// Flag name as exposed to view code.
    pub fn label(self) -> &'static str {
        match self {
            Self::ReadRules => "can_read_rules",
            Self::CreateRules => "can_create_rules",
            Self::EditRules => "can_edit_rules",
            Self::ApproveRules => "can_approve_rules",
            Self::ReviewTransactions => "can_review_transactions",
            Self::ManageCases => "can_manage_cases",
            Self::AssignReviews => "can_assign_reviews",
            Self::ViewReports => "can_view_reports",
            Self::ManageUsers => "can_manage_users",
            Self::ViewAuditLog => "can_view_audit_log",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the current user may attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    /// See [`Capability::ReadRules`].
    pub can_read_rules: bool,
    /// See [`Capability::CreateRules`].
    pub can_create_rules: bool,
    /// See [`Capability::EditRules`].
    pub can_edit_rules: bool,
    /// See [`Capability::ApproveRules`].
    pub can_approve_rules: bool,
    /// See [`Capability::ReviewTransactions`].
    pub can_review_transactions: bool,
    /// See [`Capability::ManageCases`].
    pub can_manage_cases: bool,
    /// See [`Capability::AssignReviews`].
    pub can_assign_reviews: bool,
    /// See [`Capability::ViewReports`].
    pub can_view_reports: bool,
    /// See [`Capability::ManageUsers`].
    pub can_manage_users: bool,
    /// See [`Capability::ViewAuditLog`].
    pub can_view_audit_log: bool,
}

impl Capabilities {
    /// Nothing granted.
    pub fn none() -> Self {
        Self::default()
    }

    /// Everything granted.
    pub fn all() -> Self {
        Self::of(&Capability::ALL)
    }

    /// Exactly `capabilities`.
    pub fn of(capabilities: &[Capability]) -> Self {
        capabilities
            .iter()
            .fold(Self::none(), |caps, capability| caps.with(*capability))
    }

    fn flag_mut(&mut self, capability: Capability) -> &mut bool {
        match capability {
            Capability::ReadRules => &mut self.can_read_rules,
            Capability::CreateRules => &mut self.can_create_rules,
            Capability::EditRules => &mut self.can_edit_rules,
            Capability::ApproveRules => &mut self.can_approve_rules,
            Capability::ReviewTransactions => &mut self.can_review_transactions,
            Capability::ManageCases => &mut self.can_manage_cases,
            Capability::AssignReviews => &mut self.can_assign_reviews,
            Capability::ViewReports => &mut self.can_view_reports,
            Capability::ManageUsers => &mut self.can_manage_users,
            Capability::ViewAuditLog => &mut self.can_view_audit_log,
        }
    }

    /// Whether `capability` is granted.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::ReadRules => self.can_read_rules,
            Capability::CreateRules => self.can_create_rules,
            Capability::EditRules => self.can_edit_rules,
            Capability::ApproveRules => self.can_approve_rules,
            Capability::ReviewTransactions => self.can_review_transactions,
            Capability::ManageCases => self.can_manage_cases,
            Capability::AssignReviews => self.can_assign_reviews,
            Capability::ViewReports => self.can_view_reports,
            Capability::ManageUsers => self.can_manage_users,
            Capability::ViewAuditLog => self.can_view_audit_log,
        }
    }

    /// Copy with `capability` granted.
    pub fn with(mut self, capability: Capability) -> Self {
        *self.flag_mut(capability) = true;
        self
    }

    /// Union of both grants.
    pub fn merge(self, other: Self) -> Self {
        Capability::ALL
            .into_iter()
            .filter(|c| other.has(*c))
            .fold(self, Self::with)
    }

    /// Granted flags, in declaration order.
    pub fn granted(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.has(*c))
            .collect()
    }

    /// Whether nothing is granted.
    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }

    /// Grants of `role` alone, before hierarchy expansion.
    pub fn for_role(role: SystemRole) -> Self {
        use Capability::*;
        match role {
            SystemRole::RuleViewer => Self::of(&[ReadRules]),
            SystemRole::RuleMaker => Self::of(&[CreateRules, EditRules]),
            SystemRole::RuleChecker => Self::of(&[ApproveRules]),
            SystemRole::FraudAnalyst => Self::of(&[ReviewTransactions, ManageCases]),
            SystemRole::FraudSupervisor => Self::of(&[AssignReviews, ViewReports]),
            SystemRole::PlatformAdmin => Self::of(&[ManageUsers, ViewAuditLog]),
        }
    }

    /// Grants of `role` and every role it subsumes.
    pub fn for_role_expanded(role: SystemRole) -> Self {
        role.expanded()
            .into_iter()
            .map(Self::for_role)
            .fold(Self::none(), Self::merge)
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_never_downgrades() {
        let a = Capabilities::of(&[Capability::ReadRules]);
        let b = Capabilities::of(&[Capability::ApproveRules]);
        let merged = a | b;
        assert!(merged.can_read_rules);
        assert!(merged.can_approve_rules);
        assert_eq!(merged | Capabilities::none(), merged);
    }

    #[test]
    fn test_maker_expansion_reads_but_cannot_approve() {
        let caps = Capabilities::for_role_expanded(SystemRole::RuleMaker);
        assert!(caps.can_read_rules);
        assert!(caps.can_create_rules);
        assert!(caps.can_edit_rules);
        assert!(!caps.can_approve_rules);
    }

    #[test]
    fn test_admin_expansion_is_everything() {
        assert_eq!(
            Capabilities::for_role_expanded(SystemRole::PlatformAdmin),
            Capabilities::all()
        );
    }

    #[test]
    fn test_granted_lists_flags() {
        let caps = Capabilities::for_role(SystemRole::FraudSupervisor);
        assert_eq!(
            caps.granted(),
            vec![Capability::AssignReviews, Capability::ViewReports]
        );
        assert!(Capabilities::none().is_empty());
    }
}
