//! EventState: the latest committed event id, shared with long-poll readers.
//!
//! Built on a `tokio::sync::watch` channel: every advance wakes all waiting
//! receivers, and each one re-checks its own target. Waiters hold no state in
//! the store, so dropping a wait (client disconnect) needs no cleanup.

use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

/// How long `/poll` holds a request open before answering "not yet".
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

pub struct EventState {
    current: watch::Sender<i64>,
}

impl EventState {
    /// Start the cursor at `initial_id`, normally the store's latest id.
    pub fn new(initial_id: i64) -> Self {
        let (current, _) = watch::channel(initial_id);
        Self { current }
    }

    pub fn current_id(&self) -> i64 {
        *self.current.borrow()
    }

    /// Move the cursor forward to `id`. Never moves it backwards.
    /// Returns whether the cursor changed.
    pub fn advance(&self, id: i64) -> bool {
        let advanced = self.current.send_if_modified(|current| {
            if id > *current {
                *current = id;
                true
            } else {
                false
            }
        });
        if advanced {
            debug!(id, "Event cursor advanced");
        }
        advanced
    }

    /// Wait until the cursor reaches `target_id` or `timeout` elapses.
    /// Returns `true` if the target was reached.
    pub async fn wait_until(&self, target_id: i64, timeout: Duration) -> bool {
        let mut rx = self.current.subscribe();
        let reached = tokio::time::timeout(timeout, async {
            rx.wait_for(|id| *id >= target_id).await.is_ok()
        })
        .await;

        matches!(reached, Ok(true))
    }
}
