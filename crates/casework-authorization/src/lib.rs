//! # Casework Authorization
//!
//! Decides what the signed-in user may attempt.
//!
//! - [`role`]: system roles and the fixed hierarchy between them
//! - [`scope`]: permission scopes from an external token authority
//! - [`capabilities`]: the derived capability flags
//! - [`active_role`]: the role a multi-role user chose to act as
//! - [`resolver`]: precedence rules, memoization and scope loading
//! - [`gating`]: capabilities combined with the review status machine
//!
//! Capabilities fail closed: with an external authority configured, nothing
//! is granted until scopes load, and nothing is granted if loading fails.

#![forbid(unsafe_code)]

pub mod active_role;
pub mod capabilities;
pub mod gating;
pub mod resolver;
pub mod role;
pub mod scope;

pub use active_role::ActiveRoleStore;
pub use capabilities::{Capabilities, Capability};
pub use gating::{allowed_review_actions, require, require_action};
pub use resolver::{derive_capabilities, CapabilityResolver, ResolverPolicy, ScopeState};
pub use role::SystemRole;
pub use scope::{decode_scopes, PermissionScope};
