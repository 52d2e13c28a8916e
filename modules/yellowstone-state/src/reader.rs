//! Read models over the projection tables. Used by the web server.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

pub const CATEGORY_TODO: &str = "toDoList";
pub const CATEGORY_TEMPLATE: &str = "template";
/// Lists of this category act as labels on the tasks they contain.
pub const CATEGORY_LABEL: &str = "label";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Task counts for one list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskListMetadata {
    pub list_id: i64,
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistoryEntry {
    pub id: i64,
    pub task_id: i64,
    pub update_type: String,
    pub system_comment: String,
    pub user_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The newest user comment on a task in a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecentComment {
    pub list_id: i64,
    pub task_id: i64,
    pub user_comment: String,
    pub created_at: DateTime<Utc>,
}

/// A label list that also contains `task_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskLabel {
    pub task_id: i64,
    pub list_id: i64,
    pub label: String,
}

/// A task's title with its history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistory {
    pub title: String,
    pub history: Vec<TaskHistoryEntry>,
}

/// Read-only queries against committed projection state.
#[derive(Clone)]
pub struct StateReader {
    pool: SqlitePool,
}

impl StateReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every list in global order.
    pub async fn all_task_lists(&self) -> Result<Vec<TaskList>> {
        let lists = sqlx::query_as::<_, TaskList>(
            "SELECT id, title, category, archived FROM task_list_v1 ORDER BY position, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(lists)
    }

    /// Unarchived lists of one category, in global order.
    pub async fn task_lists_in_category(&self, category: &str) -> Result<Vec<TaskList>> {
        let lists = sqlx::query_as::<_, TaskList>(
            r#"
            SELECT id, title, category, archived FROM task_list_v1
            WHERE archived = FALSE AND category = ?1
            ORDER BY position, id
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(lists)
    }

    pub async fn todo_lists(&self) -> Result<Vec<TaskList>> {
        self.task_lists_in_category(CATEGORY_TODO).await
    }

    pub async fn template_lists(&self) -> Result<Vec<TaskList>> {
        self.task_lists_in_category(CATEGORY_TEMPLATE).await
    }

    pub async fn archived_lists(&self) -> Result<Vec<TaskList>> {
        let lists = sqlx::query_as::<_, TaskList>(
            "SELECT id, title, category, archived FROM task_list_v1 WHERE archived = TRUE ORDER BY position, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(lists)
    }

    pub async fn task_list(&self, id: i64) -> Result<Option<TaskList>> {
        let list = sqlx::query_as::<_, TaskList>(
            "SELECT id, title, category, archived FROM task_list_v1 WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(list)
    }

    /// Total and completed task counts for every list that has tasks.
    pub async fn list_metadata(&self) -> Result<Vec<TaskListMetadata>> {
        let rows = sqlx::query_as::<_, TaskListMetadata>(
            r#"
            SELECT ttl.list_id AS list_id,
                   COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN t.completed_at IS NOT NULL THEN 1 ELSE 0 END), 0) AS completed
            FROM task_to_list_v1 ttl
            LEFT JOIN task_v1 t ON ttl.task_id = t.id
            GROUP BY ttl.list_id
            ORDER BY ttl.list_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Tasks of one list in list order.
    pub async fn tasks_for_list(&self, list_id: i64) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT t.id, t.title, t.due_date, t.completed_at
            FROM task_v1 t
            JOIN task_to_list_v1 ttl ON t.id = ttl.task_id
            WHERE ttl.list_id = ?1
            ORDER BY ttl.position, t.id
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    /// Latest user comment of each commented task in the list, in list order.
    pub async fn recent_comments(&self, list_id: i64) -> Result<Vec<TaskRecentComment>> {
        let comments = sqlx::query_as::<_, TaskRecentComment>(
            r#"
            WITH latest AS (
                SELECT task_id, user_comment, created_at,
                       ROW_NUMBER() OVER (PARTITION BY task_id ORDER BY created_at DESC, id DESC) AS rn
                FROM task_history_v1
                WHERE user_comment IS NOT NULL
            )
            SELECT ttl.list_id AS list_id, ttl.task_id AS task_id,
                   latest.user_comment AS user_comment, latest.created_at AS created_at
            FROM task_to_list_v1 ttl
            JOIN latest ON latest.task_id = ttl.task_id AND latest.rn = 1
            WHERE ttl.list_id = ?1
            ORDER BY ttl.position, ttl.task_id
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    /// Labels of the tasks in a list: every `label` list each task also
    /// belongs to. Tasks in list order, labels in global list order.
    pub async fn task_labels(&self, list_id: i64) -> Result<Vec<TaskLabel>> {
        let labels = sqlx::query_as::<_, TaskLabel>(
            r#"
            SELECT member.task_id AS task_id, tl.id AS list_id, tl.title AS label
            FROM task_to_list_v1 member
            JOIN task_to_list_v1 other ON other.task_id = member.task_id
            JOIN task_list_v1 tl ON tl.id = other.list_id
            WHERE member.list_id = ?1 AND tl.category = ?2
            ORDER BY member.position, member.task_id, tl.position, tl.id
            "#,
        )
        .bind(list_id)
        .bind(CATEGORY_LABEL)
        .fetch_all(&self.pool)
        .await?;
        Ok(labels)
    }

    pub async fn task(&self, id: i64) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            "SELECT id, title, due_date, completed_at FROM task_v1 WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    /// `None` when the task does not exist (including after deletion).
    pub async fn task_history(&self, task_id: i64) -> Result<Option<TaskHistory>> {
        let Some(title) = sqlx::query_scalar::<_, String>("SELECT title FROM task_v1 WHERE id = ?1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let history = sqlx::query_as::<_, TaskHistoryEntry>(
            r#"
            SELECT id, task_id, update_type, system_comment, user_comment, created_at
            FROM task_history_v1
            WHERE task_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(TaskHistory { title, history }))
    }
}
