use thiserror::Error;

use crate::id::TaskId;

#[derive(Error, Debug)]
pub enum FmError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Parent task not found: {0}")]
    ParentNotFound(TaskId),

    #[error("Task {0} belongs to another owner")]
    CrossOwner(TaskId),

    #[error("Task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    #[error("Dependency would create a cycle: {task_id} -> {depends_on_id}")]
    CycleDetected {
        task_id: TaskId,
        depends_on_id: TaskId,
    },

    #[error("Dependency already exists: {task_id} -> {depends_on_id}")]
    DependencyExists {
        task_id: TaskId,
        depends_on_id: TaskId,
    },

    #[error("Dependency not found: {task_id} -> {depends_on_id}")]
    DependencyNotFound {
        task_id: TaskId,
        depends_on_id: TaskId,
    },

    #[error("Parent {0} is already a subtask: subtasks cannot have children")]
    ParentAlreadyNested(TaskId),

    #[error("Task {0} cannot be its own parent")]
    OwnParent(TaskId),

    #[error("Task {0} has subtasks and cannot become a subtask itself")]
    MaxDepthExceeded(TaskId),

    #[error("Cannot complete {0}: subtasks incomplete")]
    SubtasksIncomplete(TaskId),

    #[error("Cannot start {0}: blocked by incomplete dependencies")]
    TaskBlocked(TaskId),

    #[error("Task {0} is already completed")]
    AlreadyCompleted(TaskId),

    #[error("Cannot reopen {0}: task is not completed")]
    NotCompleted(TaskId),

    #[error("Invalid owner: {0}")]
    InvalidOwner(#[from] crate::id::IdParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FmError>;
