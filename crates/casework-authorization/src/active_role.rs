//! The role a multi-role user has chosen to act as.
//!
//! One store per signed-in session, handed to every consumer that needs it.
//! Changes are broadcast through the underlying [`Dynamic`] so capability
//! resolvers can recompute.

use casework_core::errors::{CaseworkError, Result};
use casework_core::reactive::{Dynamic, Subscription};

use crate::role::SystemRole;

/// Shared active-role selection. Clones observe the same selection.
#[derive(Clone, Default)]
pub struct ActiveRoleStore {
    current: Dynamic<Option<SystemRole>>,
}

impl std::fmt::Debug for ActiveRoleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRoleStore")
            .field("current", &self.current())
            .finish()
    }
}

impl ActiveRoleStore {
    /// Store with no role selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Act as `role`, which must be one of `assigned`.
    pub fn select(&self, role: SystemRole, assigned: &[SystemRole]) -> Result<()> {
        if !assigned.contains(&role) {
            return Err(CaseworkError::permission_denied(format!(
                "role {role} is not assigned to this user"
            )));
        }
        if self.current.set_if_changed(Some(role)) {
            tracing::info!(%role, "active role selected");
        }
        Ok(())
    }

    /// Drop the selection, e.g. on logout.
    pub fn clear(&self) {
        if self.current.set_if_changed(None) {
            tracing::info!("active role cleared");
        }
    }

    /// Selected role, if any.
    pub fn current(&self) -> Option<SystemRole> {
        self.current.get()
    }

    /// Subscribe to selection changes.
    pub fn subscribe(&self) -> Subscription<Option<SystemRole>> {
        self.current.subscribe()
    }
}
