//! System roles and the fixed role hierarchy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use casework_core::errors::CaseworkError;

/// Role assigned to a user by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemRole {
    /// Subsumes every other role
    PlatformAdmin,
    /// Authors rules
    RuleMaker,
    /// Approves rules written by makers
    RuleChecker,
    /// Reads rules
    RuleViewer,
    /// Works transaction reviews and cases
    FraudAnalyst,
    /// Supervises analysts
    FraudSupervisor,
}

impl SystemRole {
    /// Every role.
    pub const ALL: [SystemRole; 6] = [
        Self::PlatformAdmin,
        Self::RuleMaker,
        Self::RuleChecker,
        Self::RuleViewer,
        Self::FraudAnalyst,
        Self::FraudSupervisor,
    ];

    /// Roles this role directly subsumes.
    pub fn subsumes(self) -> &'static [SystemRole] {
        match self {
            Self::PlatformAdmin => &[
                Self::RuleMaker,
                Self::RuleChecker,
                Self::RuleViewer,
                Self::FraudAnalyst,
                Self::FraudSupervisor,
            ],
            Self::RuleMaker | Self::RuleChecker => &[Self::RuleViewer],
            Self::FraudSupervisor => &[Self::FraudAnalyst],
            Self::RuleViewer | Self::FraudAnalyst => &[],
        }
    }

    /// This role plus everything it subsumes, transitively.
    pub fn expanded(self) -> BTreeSet<SystemRole> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(role) = stack.pop() {
            if seen.insert(role) {
                stack.extend_from_slice(role.subsumes());
            }
        }
        seen
    }

    /// Whether holding `self` implies holding `other`.
    pub fn includes(self, other: SystemRole) -> bool {
        self.expanded().contains(&other)
    }

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlatformAdmin => "PLATFORM_ADMIN",
            Self::RuleMaker => "RULE_MAKER",
            Self::RuleChecker => "RULE_CHECKER",
            Self::RuleViewer => "RULE_VIEWER",
            Self::FraudAnalyst => "FRAUD_ANALYST",
            Self::FraudSupervisor => "FRAUD_SUPERVISOR",
        }
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemRole {
    type Err = CaseworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| CaseworkError::invalid(format!("unknown role '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hierarchy_edges() {
        assert!(SystemRole::RuleMaker.includes(SystemRole::RuleViewer));
        assert!(SystemRole::RuleChecker.includes(SystemRole::RuleViewer));
        assert!(SystemRole::FraudSupervisor.includes(SystemRole::FraudAnalyst));
        assert!(!SystemRole::RuleMaker.includes(SystemRole::RuleChecker));
        assert!(!SystemRole::FraudAnalyst.includes(SystemRole::FraudSupervisor));
        assert_eq!(
            SystemRole::RuleViewer.expanded(),
            BTreeSet::from([SystemRole::RuleViewer])
        );
    }

    #[test]
    fn test_admin_expands_to_everything() {
        let all: BTreeSet<_> = SystemRole::ALL.into_iter().collect();
        assert_eq!(SystemRole::PlatformAdmin.expanded(), all);
    }

    #[test]
    fn test_parse_is_lenient() {
        assert_eq!(
            "fraud-supervisor".parse::<SystemRole>().unwrap(),
            SystemRole::FraudSupervisor
        );
        assert!("auditor".parse::<SystemRole>().is_err());
        let decoded: SystemRole = serde_json::from_str("\"RULE_CHECKER\"").unwrap();
        assert_eq!(decoded, SystemRole::RuleChecker);
    }

    fn any_role() -> impl Strategy<Value = SystemRole> {
        prop::sample::select(SystemRole::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_inclusion_is_reflexive_and_transitive(
            a in any_role(),
            b in any_role(),
            c in any_role(),
        ) {
            prop_assert!(a.includes(a));
            if a.includes(b) && b.includes(c) {
                prop_assert!(a.includes(c));
            }
        }

        #[test]
        fn prop_only_admin_includes_admin(role in any_role()) {
            prop_assert_eq!(
                role.includes(SystemRole::PlatformAdmin),
                role == SystemRole::PlatformAdmin
            );
        }
    }
}
