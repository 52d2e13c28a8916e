//! Event dispatch engine.
//!
//! Decode → dedup → project → append → commit → advance cursor. Every publish
//! is one SQLite transaction: either the event row and all of its projection
//! effects commit, or none do.
//!
//! Consumers define their domain by implementing `EventLike` (a closed set of
//! typed events) and `Projection` (handlers that write derived tables).

pub mod engine;
pub mod error;
pub mod registry;
pub mod traits;

pub use engine::{Engine, PublishOutcome, PublishStatus, ReplayStats, MAX_FOLLOW_UPS};
pub use error::DispatchError;
pub use registry::ProjectionRegistry;
pub use traits::{ApplyContext, ApplyResult, EventLike, Projection};
