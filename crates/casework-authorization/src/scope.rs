//! Permission scopes issued by an external token authority.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use casework_core::errors::{CaseworkError, Result};

use crate::capabilities::{Capabilities, Capability};

/// Opaque grant string such as `approve:rules`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionScope(String);

impl PermissionScope {
    /// Rule read access.
    pub const READ_RULES: &'static str = "read:rules";
    /// Rule create and edit access.
    pub const WRITE_RULES: &'static str = "write:rules";
    /// Rule approval.
    pub const APPROVE_RULES: &'static str = "approve:rules";
    /// Transaction review.
    pub const REVIEW_TRANSACTIONS: &'static str = "review:transactions";
    /// Case management.
    pub const MANAGE_CASES: &'static str = "manage:cases";
    /// Review assignment.
    pub const ASSIGN_REVIEWS: &'static str = "assign:reviews";
    /// Report access.
    pub const READ_REPORTS: &'static str = "read:reports";
    /// User administration.
    pub const MANAGE_USERS: &'static str = "manage:users";
    /// Audit log access.
    pub const READ_AUDIT: &'static str = "read:audit";
    /// Grants everything and overrides every other input
    pub const ADMIN_ALL: &'static str = "admin:all";

    /// Wrap a raw scope string.
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// The raw scope string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is [`ADMIN_ALL`](Self::ADMIN_ALL).
    pub fn is_admin(&self) -> bool {
        self.0 == Self::ADMIN_ALL
    }

    /// Capabilities this scope grants. Unknown scopes grant nothing.
    pub fn grants(&self) -> Capabilities {
        use Capability::*;
        match self.0.as_str() {
            Self::READ_RULES => Capabilities::of(&[ReadRules]),
            Self::WRITE_RULES => Capabilities::of(&[CreateRules, EditRules]),
            Self::APPROVE_RULES => Capabilities::of(&[ApproveRules]),
            Self::REVIEW_TRANSACTIONS => Capabilities::of(&[ReviewTransactions]),
            Self::MANAGE_CASES => Capabilities::of(&[ManageCases]),
            Self::ASSIGN_REVIEWS => Capabilities::of(&[AssignReviews]),
            Self::READ_REPORTS => Capabilities::of(&[ViewReports]),
            Self::MANAGE_USERS => Capabilities::of(&[ManageUsers]),
            Self::READ_AUDIT => Capabilities::of(&[ViewAuditLog]),
            Self::ADMIN_ALL => Capabilities::all(),
            _ => Capabilities::none(),
        }
    }
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PermissionScope {
    fn from(scope: &str) -> Self {
        Self::new(scope)
    }
}

/// Decode the scope endpoint's reply.
///
/// Accepts a bare array, `{ "scopes": [...] }`, `{ "permissions": [...] }`,
/// or an OAuth-style space-delimited `{ "scope": "a b" }`. Blank entries are
/// dropped and duplicates collapsed.
pub fn decode_scopes(value: Value) -> Result<Vec<PermissionScope>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ScopeShape {
        Bare(Vec<String>),
        Scopes { scopes: Vec<String> },
        Permissions { permissions: Vec<String> },
        Delimited { scope: String },
    }

    let raw = match serde_json::from_value::<ScopeShape>(value) {
        Ok(ScopeShape::Bare(list)
        | ScopeShape::Scopes { scopes: list }
        | ScopeShape::Permissions { permissions: list }) => list,
        Ok(ScopeShape::Delimited { scope }) => {
            scope.split_whitespace().map(str::to_string).collect()
        }
        Err(e) => {
            return Err(CaseworkError::serialization(format!(
                "unexpected scopes response: {e}"
            )))
        }
    };

    let mut scopes: Vec<PermissionScope> = raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PermissionScope)
        .collect();
    scopes.sort();
    scopes.dedup();
    Ok(scopes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_shapes_agree() {
        let expected = vec![
            PermissionScope::new("approve:rules"),
            PermissionScope::new("read:rules"),
        ];
        for shape in [
            json!(["read:rules", "approve:rules"]),
            json!({ "scopes": ["approve:rules", "read:rules", "read:rules"] }),
            json!({ "permissions": ["read:rules", " ", "approve:rules"] }),
            json!({ "scope": "read:rules  approve:rules" }),
        ] {
            assert_eq!(decode_scopes(shape).unwrap(), expected);
        }
    }

    #[test]
    fn test_scope_garbage_is_serialization_error() {
        let err = decode_scopes(json!({ "roles": 1 })).unwrap_err();
        assert!(matches!(err, CaseworkError::Serialization { .. }));
    }

    #[test]
    fn test_write_rules_grants_create_and_edit() {
        let caps = PermissionScope::new("write:rules").grants();
        assert!(caps.can_create_rules && caps.can_edit_rules);
        assert!(!caps.can_approve_rules);
        assert!(PermissionScope::new("launch:missiles").grants().is_empty());
    }
}
