//! # Reactive Primitives
//!
//! - [`Dynamic<T>`]: an observable value with a version counter.
//! - [`Subscription<T>`]: a poll- or await-based view of a `Dynamic<T>`.
//!
//! Synchronizers publish their state through these cells so that view code
//! can observe optimistic writes before any network round-trip completes.

mod dynamic;

pub use dynamic::{Dynamic, Subscription};
