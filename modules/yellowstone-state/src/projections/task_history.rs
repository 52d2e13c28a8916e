use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use yellowstone_engine::{ApplyContext, ApplyResult, Projection};

use crate::events::{
    TaskEvent, TASK_ADD_COMMENT, TASK_DELETE, TASK_UPDATE_COMPLETED, TASK_UPDATE_DUE_DATE,
    TASK_UPDATE_TITLE,
};

const UPDATE_TITLE: &str = "update_title";
const UPDATE_COMPLETED: &str = "update_completed";
const UPDATE_DUE_DATE: &str = "update_due_date";
const DELETE: &str = "delete";
const ADD_COMMENT: &str = "add_comment";

/// Per-task audit trail, stamped with the event's commit time.
pub struct TaskHistoryProjection;

struct Entry<'a> {
    task_id: i64,
    update_type: &'static str,
    system_comment: String,
    user_comment: Option<&'a str>,
}

#[async_trait]
impl Projection<TaskEvent> for TaskHistoryProjection {
    fn name(&self) -> &'static str {
        "task_history"
    }

    fn handles(&self) -> &'static [&'static str] {
        &[
            TASK_UPDATE_TITLE,
            TASK_UPDATE_COMPLETED,
            TASK_UPDATE_DUE_DATE,
            TASK_DELETE,
            TASK_ADD_COMMENT,
        ]
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        event: &TaskEvent,
        cx: &mut ApplyContext<TaskEvent>,
    ) -> Result<ApplyResult> {
        let entry = match event {
            TaskEvent::TaskUpdateTitle { task_id, title } => Entry {
                task_id: *task_id,
                update_type: UPDATE_TITLE,
                system_comment: format!("Title updated to: {title}"),
                user_comment: None,
            },
            TaskEvent::TaskUpdateCompleted {
                task_id,
                completed_at,
            } => Entry {
                task_id: *task_id,
                update_type: UPDATE_COMPLETED,
                system_comment: match completed_at {
                    Some(at) => format!("Task marked as completed at {}", timestamp(at)),
                    None => "Task marked as not completed".to_string(),
                },
                user_comment: None,
            },
            TaskEvent::TaskUpdateDueDate { task_id, due_date } => Entry {
                task_id: *task_id,
                update_type: UPDATE_DUE_DATE,
                system_comment: match due_date {
                    Some(at) => format!("Due date set to {}", timestamp(at)),
                    None => "Due date removed".to_string(),
                },
                user_comment: None,
            },
            TaskEvent::TaskDelete { task_id } => Entry {
                task_id: *task_id,
                update_type: DELETE,
                system_comment: "Task deleted".to_string(),
                user_comment: None,
            },
            TaskEvent::TaskAddComment {
                task_id,
                user_comment,
            } => Entry {
                task_id: *task_id,
                update_type: ADD_COMMENT,
                system_comment: String::new(),
                user_comment: Some(user_comment.as_str()),
            },
            _ => return Ok(ApplyResult::NoOp),
        };

        // The task projection runs first, so a deleted task is already gone.
        if entry.update_type != DELETE && !task_exists(conn, entry.task_id).await? {
            debug!(task_id = entry.task_id, update_type = entry.update_type, "No such task, history skipped");
            return Ok(ApplyResult::NoOp);
        }

        sqlx::query(
            r#"
            INSERT INTO task_history_v1 (task_id, update_type, system_comment, user_comment, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(entry.task_id)
        .bind(entry.update_type)
        .bind(&entry.system_comment)
        .bind(entry.user_comment)
        .bind(cx.committed_at())
        .execute(&mut *conn)
        .await?;

        Ok(ApplyResult::Applied)
    }
}

async fn task_exists(conn: &mut SqliteConnection, task_id: i64) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM task_v1 WHERE id = ?1)")
        .bind(task_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
