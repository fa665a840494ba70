//! # Casework Core
//!
//! Foundation layer for the analyst workflow: the unified error type, the
//! effect seams (transport, time, abort), the reactive [`Dynamic`] cell that
//! every synchronizer exposes its state through, domain records with their
//! optimistic projections, and layered configuration.
//!
//! Nothing in this crate performs I/O on its own. The synchronizer crate
//! drives the transport; hosts supply an implementation of
//! [`effects::TransportEffects`].
//!
//! [`Dynamic`]: reactive::Dynamic

#![forbid(unsafe_code)]

pub mod config;
pub mod effects;
pub mod errors;
pub mod reactive;
pub mod telemetry;
pub mod types;

pub use config::CaseworkConfig;
pub use errors::{CaseworkError, ErrorCategory, Result};
