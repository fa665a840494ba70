//! Effect interfaces consumed by the workflow core.
//!
//! # Effect Classification
//!
//! - **Transport**: remote JSON calls, supplied by the host application
//! - **Time**: wall-clock reads for optimistic timestamps
//! - **Abort**: cooperative cancellation tokens attached to requests
//!
//! Only the abort token and the system clock have implementations here; the
//! transport is always an external collaborator.

pub mod abort;
pub mod time;
pub mod transport;

pub use abort::{AbortController, AbortSignal};
pub use time::{PhysicalTimeEffects, SystemClock};
pub use transport::{Method, RequestOptions, TransportEffects, TransportError};
