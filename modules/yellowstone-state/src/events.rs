//! Task domain events.
//!
//! Every event travels as a JSON envelope `{"type": "<Namespace:Action>", ...}`
//! with camelCase fields. The tag strings are part of the stored log and must
//! never change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yellowstone_engine::EventLike;

pub const TASK_LIST_ADD: &str = "TaskList:Add";
pub const TASK_LIST_UPDATE_TITLE: &str = "TaskList:UpdateTitle";
pub const TASK_LIST_UPDATE_ARCHIVED: &str = "TaskList:UpdateArchived";
pub const TASK_LIST_REORDER: &str = "TaskList:Reorder";
pub const TASK_ADD: &str = "Task:Add";
pub const TASK_UPDATE_TITLE: &str = "Task:UpdateTitle";
pub const TASK_UPDATE_COMPLETED: &str = "Task:UpdateCompleted";
pub const TASK_UPDATE_DUE_DATE: &str = "Task:UpdateDueDate";
pub const TASK_DELETE: &str = "Task:Delete";
pub const TASK_ADD_COMMENT: &str = "Task:AddComment";
pub const TASK_LIST_ADD_TASK: &str = "TaskList:AddTask";
pub const TASK_LIST_MOVE_TASKS: &str = "TaskList:MoveTasks";
pub const TASK_LIST_COPY_TASKS: &str = "TaskList:CopyTasks";
pub const TASK_LIST_REORDER_TASKS: &str = "TaskList:ReorderTasks";
pub const TASK_LIST_DUPLICATE_TASKS: &str = "TaskList:DuplicateTasks";

/// Every type string this domain decodes. Anything else is stored unprojected.
pub const KNOWN_TYPES: &[&str] = &[
    TASK_LIST_ADD,
    TASK_LIST_UPDATE_TITLE,
    TASK_LIST_UPDATE_ARCHIVED,
    TASK_LIST_REORDER,
    TASK_ADD,
    TASK_UPDATE_TITLE,
    TASK_UPDATE_COMPLETED,
    TASK_UPDATE_DUE_DATE,
    TASK_DELETE,
    TASK_ADD_COMMENT,
    TASK_LIST_ADD_TASK,
    TASK_LIST_MOVE_TASKS,
    TASK_LIST_COPY_TASKS,
    TASK_LIST_REORDER_TASKS,
    TASK_LIST_DUPLICATE_TASKS,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    // -----------------------------------------------------------------
    // Task lists
    // -----------------------------------------------------------------
    #[serde(rename = "TaskList:Add", rename_all = "camelCase")]
    TaskListAdd {
        title: String,
        category: String,
        #[serde(default)]
        archived: bool,
    },

    #[serde(rename = "TaskList:UpdateTitle", rename_all = "camelCase")]
    TaskListUpdateTitle { list_id: i64, title: String },

    #[serde(rename = "TaskList:UpdateArchived", rename_all = "camelCase")]
    TaskListUpdateArchived { list_id: i64, archived: bool },

    /// Move a list directly after `after_list_id`, or to the front.
    #[serde(rename = "TaskList:Reorder", rename_all = "camelCase")]
    TaskListReorder {
        list_id: i64,
        #[serde(default)]
        after_list_id: Option<i64>,
    },

    // -----------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------
    #[serde(rename = "Task:Add", rename_all = "camelCase")]
    TaskAdd {
        title: String,
        #[serde(default)]
        due_date: Option<DateTime<Utc>>,
        #[serde(alias = "taskListId")]
        list_id: i64,
    },

    #[serde(rename = "Task:UpdateTitle", rename_all = "camelCase")]
    TaskUpdateTitle { task_id: i64, title: String },

    #[serde(rename = "Task:UpdateCompleted", rename_all = "camelCase")]
    TaskUpdateCompleted {
        task_id: i64,
        #[serde(default)]
        completed_at: Option<DateTime<Utc>>,
    },

    #[serde(rename = "Task:UpdateDueDate", rename_all = "camelCase")]
    TaskUpdateDueDate {
        task_id: i64,
        #[serde(default)]
        due_date: Option<DateTime<Utc>>,
    },

    #[serde(rename = "Task:Delete", rename_all = "camelCase")]
    TaskDelete { task_id: i64 },

    #[serde(rename = "Task:AddComment", rename_all = "camelCase")]
    TaskAddComment { task_id: i64, user_comment: String },

    // -----------------------------------------------------------------
    // Membership and ordering
    // -----------------------------------------------------------------
    #[serde(rename = "TaskList:AddTask", rename_all = "camelCase")]
    TaskListAddTask { task_id: i64, list_id: i64 },

    #[serde(rename = "TaskList:MoveTasks", rename_all = "camelCase")]
    TaskListMoveTasks {
        task_ids: Vec<i64>,
        old_list_id: i64,
        new_list_id: i64,
    },

    #[serde(rename = "TaskList:CopyTasks", rename_all = "camelCase")]
    TaskListCopyTasks { task_ids: Vec<i64>, new_list_id: i64 },

    #[serde(rename = "TaskList:ReorderTasks", rename_all = "camelCase")]
    TaskListReorderTasks {
        task_list_id: i64,
        old_task_id: i64,
        #[serde(default)]
        after_task_id: Option<i64>,
    },

    #[serde(rename = "TaskList:DuplicateTasks", rename_all = "camelCase")]
    TaskListDuplicateTasks { task_ids: Vec<i64>, new_list_id: i64 },
}

impl TaskEvent {
    /// Serialize into the envelope form clients publish.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl EventLike for TaskEvent {
    fn event_type_str(&self) -> &'static str {
        match self {
            TaskEvent::TaskListAdd { .. } => TASK_LIST_ADD,
            TaskEvent::TaskListUpdateTitle { .. } => TASK_LIST_UPDATE_TITLE,
            TaskEvent::TaskListUpdateArchived { .. } => TASK_LIST_UPDATE_ARCHIVED,
            TaskEvent::TaskListReorder { .. } => TASK_LIST_REORDER,
            TaskEvent::TaskAdd { .. } => TASK_ADD,
            TaskEvent::TaskUpdateTitle { .. } => TASK_UPDATE_TITLE,
            TaskEvent::TaskUpdateCompleted { .. } => TASK_UPDATE_COMPLETED,
            TaskEvent::TaskUpdateDueDate { .. } => TASK_UPDATE_DUE_DATE,
            TaskEvent::TaskDelete { .. } => TASK_DELETE,
            TaskEvent::TaskAddComment { .. } => TASK_ADD_COMMENT,
            TaskEvent::TaskListAddTask { .. } => TASK_LIST_ADD_TASK,
            TaskEvent::TaskListMoveTasks { .. } => TASK_LIST_MOVE_TASKS,
            TaskEvent::TaskListCopyTasks { .. } => TASK_LIST_COPY_TASKS,
            TaskEvent::TaskListReorderTasks { .. } => TASK_LIST_REORDER_TASKS,
            TaskEvent::TaskListDuplicateTasks { .. } => TASK_LIST_DUPLICATE_TASKS,
        }
    }

    fn decode(event_type: &str, envelope: &serde_json::Value) -> Option<Result<Self, serde_json::Error>> {
        if !KNOWN_TYPES.contains(&event_type) {
            return None;
        }
        // The declared type wins over whatever `type` the body carries.
        let mut envelope = envelope.clone();
        if let Some(obj) = envelope.as_object_mut() {
            obj.insert("type".into(), serde_json::Value::String(event_type.to_string()));
        }
        Some(serde_json::from_value(envelope))
    }
}
