//! # Casework Sync
//!
//! Keeps locally held, optimistically mutated copies of server-owned
//! workflow records consistent with the remote source of truth.
//!
//! - [`slot`]: per-resource request slots; only the newest request lands
//! - [`resource`]: fetch state (`data`, `loading`, `error`) behind a slot
//! - [`mutation`]: snapshot, project, call, reconcile or roll back
//! - [`review`]: the transaction review record and its four actions
//! - [`collections`]: notes, cases and the analyst worklist
//!
//! Responses are decoded once, in [`decode`], into canonical domain types.

#![forbid(unsafe_code)]

pub mod collections;
pub mod context;
pub mod decode;
pub mod mutation;
pub mod paths;
pub mod resource;
pub mod review;
pub mod slot;

pub use collections::{CasesSynchronizer, ListState, NotesSynchronizer, WorklistSynchronizer};
pub use context::SyncContext;
pub use mutation::{MutationOutcome, OptimisticEngine, Reconciled};
pub use paths::ApiPaths;
pub use resource::{FetchOutcome, Resource};
pub use review::ReviewSynchronizer;
pub use slot::{AbortCoordinator, RequestSlot, RequestTicket, ResourceKey};

pub use casework_core::{CaseworkError, Result};
