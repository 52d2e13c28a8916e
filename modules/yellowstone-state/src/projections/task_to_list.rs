use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;
use yellowstone_engine::{ApplyContext, ApplyResult, Projection};

use crate::events::{
    TaskEvent, TASK_DELETE, TASK_LIST_ADD_TASK, TASK_LIST_COPY_TASKS, TASK_LIST_DUPLICATE_TASKS,
    TASK_LIST_MOVE_TASKS, TASK_LIST_REORDER_TASKS,
};
use crate::ordering::{duplicate_task, OrderedCollection};

use super::applied_if;

/// Which lists a task belongs to, and where.
pub struct TaskToListProjection;

#[async_trait]
impl Projection<TaskEvent> for TaskToListProjection {
    fn name(&self) -> &'static str {
        "task_to_list"
    }

    fn handles(&self) -> &'static [&'static str] {
        &[
            TASK_LIST_ADD_TASK,
            TASK_DELETE,
            TASK_LIST_MOVE_TASKS,
            TASK_LIST_COPY_TASKS,
            TASK_LIST_REORDER_TASKS,
            TASK_LIST_DUPLICATE_TASKS,
        ]
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        event: &TaskEvent,
        _cx: &mut ApplyContext<TaskEvent>,
    ) -> Result<ApplyResult> {
        match event {
            TaskEvent::TaskListAddTask { task_id, list_id } => {
                let added = OrderedCollection::list_tasks(*list_id)
                    .append(conn, *task_id)
                    .await?;
                Ok(applied_if(added))
            }

            TaskEvent::TaskDelete { task_id } => {
                let result = sqlx::query("DELETE FROM task_to_list_v1 WHERE task_id = ?1")
                    .bind(task_id)
                    .execute(&mut *conn)
                    .await?;
                Ok(applied_if(result.rows_affected() > 0))
            }

            TaskEvent::TaskListMoveTasks {
                task_ids,
                old_list_id,
                new_list_id,
            } => {
                let from = OrderedCollection::list_tasks(*old_list_id);
                let to = OrderedCollection::list_tasks(*new_list_id);
                let mut changed = false;
                for &task_id in task_ids {
                    changed |= from.move_to(conn, task_id, &to).await?;
                }
                debug!(?task_ids, old_list_id, new_list_id, "Tasks moved");
                Ok(applied_if(changed))
            }

            TaskEvent::TaskListCopyTasks {
                task_ids,
                new_list_id,
            } => {
                let to = OrderedCollection::list_tasks(*new_list_id);
                let mut changed = false;
                for &task_id in task_ids {
                    changed |= to.append(conn, task_id).await?;
                }
                Ok(applied_if(changed))
            }

            TaskEvent::TaskListReorderTasks {
                task_list_id,
                old_task_id,
                after_task_id,
            } => {
                let moved = OrderedCollection::list_tasks(*task_list_id)
                    .reorder_after(conn, *old_task_id, *after_task_id)
                    .await?;
                debug!(task_list_id, old_task_id, ?after_task_id, moved, "Tasks reordered");
                Ok(applied_if(moved))
            }

            TaskEvent::TaskListDuplicateTasks {
                task_ids,
                new_list_id,
            } => {
                let to = OrderedCollection::list_tasks(*new_list_id);
                let mut copies = Vec::with_capacity(task_ids.len());
                for &source in task_ids {
                    if let Some(copy) = duplicate_task(conn, source, &to).await? {
                        copies.push(copy);
                    }
                }
                debug!(?task_ids, ?copies, new_list_id, "Tasks duplicated");
                Ok(applied_if(!copies.is_empty()))
            }

            _ => Ok(ApplyResult::NoOp),
        }
    }
}
