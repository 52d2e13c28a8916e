//! Append-only event log backed by SQLite.
//!
//! Stores opaque JSON envelopes keyed by a monotonically increasing id and a
//! caller-supplied idempotency token. Knows nothing about tasks or lists.
//!
//! Also home to [`EventState`], the in-memory cursor long-poll readers wait on.

pub mod error;
pub mod pool;
pub mod store;
pub mod tracker;
pub mod types;

pub use error::StoreError;
pub use pool::open_pool;
pub use store::EventStore;
pub use tracker::{EventState, DEFAULT_POLL_TIMEOUT};
pub use types::{AppendEvent, StoredEvent};
