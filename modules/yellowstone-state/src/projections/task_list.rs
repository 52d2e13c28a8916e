use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;
use yellowstone_engine::{ApplyContext, ApplyResult, Projection};

use crate::events::{
    TaskEvent, TASK_LIST_ADD, TASK_LIST_REORDER, TASK_LIST_UPDATE_ARCHIVED, TASK_LIST_UPDATE_TITLE,
};
use crate::ordering::OrderedCollection;

use super::applied_if;

/// Task lists and their global order.
pub struct TaskListProjection;

#[async_trait]
impl Projection<TaskEvent> for TaskListProjection {
    fn name(&self) -> &'static str {
        "task_list"
    }

    fn handles(&self) -> &'static [&'static str] {
        &[
            TASK_LIST_ADD,
            TASK_LIST_UPDATE_TITLE,
            TASK_LIST_UPDATE_ARCHIVED,
            TASK_LIST_REORDER,
        ]
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        event: &TaskEvent,
        _cx: &mut ApplyContext<TaskEvent>,
    ) -> Result<ApplyResult> {
        match event {
            TaskEvent::TaskListAdd {
                title,
                category,
                archived,
            } => {
                let position = OrderedCollection::task_lists().next_position(conn).await?;
                let id = sqlx::query(
                    "INSERT INTO task_list_v1 (title, category, archived, position) VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(title)
                .bind(category)
                .bind(archived)
                .bind(position)
                .execute(&mut *conn)
                .await?
                .last_insert_rowid();

                debug!(list_id = id, position, %category, "Task list added");
                Ok(ApplyResult::Applied)
            }

            TaskEvent::TaskListUpdateTitle { list_id, title } => {
                let result = sqlx::query("UPDATE task_list_v1 SET title = ?1 WHERE id = ?2")
                    .bind(title)
                    .bind(list_id)
                    .execute(&mut *conn)
                    .await?;
                Ok(applied_if(result.rows_affected() > 0))
            }

            TaskEvent::TaskListUpdateArchived { list_id, archived } => {
                let result = sqlx::query("UPDATE task_list_v1 SET archived = ?1 WHERE id = ?2")
                    .bind(archived)
                    .bind(list_id)
                    .execute(&mut *conn)
                    .await?;
                Ok(applied_if(result.rows_affected() > 0))
            }

            TaskEvent::TaskListReorder {
                list_id,
                after_list_id,
            } => {
                let moved = OrderedCollection::task_lists()
                    .reorder_after(conn, *list_id, *after_list_id)
                    .await?;
                debug!(list_id, ?after_list_id, moved, "Task list reordered");
                Ok(applied_if(moved))
            }

            _ => Ok(ApplyResult::NoOp),
        }
    }
}
