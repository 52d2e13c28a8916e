//! Projections from task events into the `*_v1` tables.
//!
//! Each projection runs inside the dispatch transaction, reads only its
//! tables, and never looks at the wall clock.

use yellowstone_engine::ApplyResult;

mod task;
mod task_history;
mod task_list;
mod task_to_list;

pub use task::TaskProjection;
pub use task_history::TaskHistoryProjection;
pub use task_list::TaskListProjection;
pub use task_to_list::TaskToListProjection;

/// `Applied` when a write touched a row, `NoOp` otherwise.
pub(crate) fn applied_if(changed: bool) -> ApplyResult {
    if changed {
        ApplyResult::Applied
    } else {
        ApplyResult::NoOp
    }
}
