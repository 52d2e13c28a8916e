use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;
use yellowstone_engine::{ApplyContext, ApplyResult, Projection};

use crate::events::{
    TaskEvent, TASK_ADD, TASK_DELETE, TASK_UPDATE_COMPLETED, TASK_UPDATE_DUE_DATE, TASK_UPDATE_TITLE,
};

use super::applied_if;

/// Task rows. Placing a new task in its list is left to the membership
/// projection, through a `TaskList:AddTask` follow-up.
pub struct TaskProjection;

#[async_trait]
impl Projection<TaskEvent> for TaskProjection {
    fn name(&self) -> &'static str {
        "task"
    }

    fn handles(&self) -> &'static [&'static str] {
        &[
            TASK_ADD,
            TASK_UPDATE_TITLE,
            TASK_UPDATE_COMPLETED,
            TASK_UPDATE_DUE_DATE,
            TASK_DELETE,
        ]
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        event: &TaskEvent,
        cx: &mut ApplyContext<TaskEvent>,
    ) -> Result<ApplyResult> {
        match event {
            TaskEvent::TaskAdd {
                title,
                due_date,
                list_id,
            } => {
                let task_id = sqlx::query("INSERT INTO task_v1 (title, due_date) VALUES (?1, ?2)")
                    .bind(title)
                    .bind(due_date)
                    .execute(&mut *conn)
                    .await?
                    .last_insert_rowid();

                debug!(task_id, list_id, "Task added");
                cx.emit(TaskEvent::TaskListAddTask {
                    task_id,
                    list_id: *list_id,
                });
                Ok(ApplyResult::Applied)
            }

            TaskEvent::TaskUpdateTitle { task_id, title } => {
                let result = sqlx::query("UPDATE task_v1 SET title = ?1 WHERE id = ?2")
                    .bind(title)
                    .bind(task_id)
                    .execute(&mut *conn)
                    .await?;
                Ok(applied_if(result.rows_affected() > 0))
            }

            TaskEvent::TaskUpdateCompleted {
                task_id,
                completed_at,
            } => {
                let result = sqlx::query("UPDATE task_v1 SET completed_at = ?1 WHERE id = ?2")
                    .bind(completed_at)
                    .bind(task_id)
                    .execute(&mut *conn)
                    .await?;
                Ok(applied_if(result.rows_affected() > 0))
            }

            TaskEvent::TaskUpdateDueDate { task_id, due_date } => {
                let result = sqlx::query("UPDATE task_v1 SET due_date = ?1 WHERE id = ?2")
                    .bind(due_date)
                    .bind(task_id)
                    .execute(&mut *conn)
                    .await?;
                Ok(applied_if(result.rows_affected() > 0))
            }

            TaskEvent::TaskDelete { task_id } => {
                let result = sqlx::query("DELETE FROM task_v1 WHERE id = ?1")
                    .bind(task_id)
                    .execute(&mut *conn)
                    .await?;
                debug!(task_id, deleted = result.rows_affected(), "Task deleted");
                Ok(applied_if(result.rows_affected() > 0))
            }

            _ => Ok(ApplyResult::NoOp),
        }
    }
}
