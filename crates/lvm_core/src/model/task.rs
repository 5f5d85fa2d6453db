//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by inbox, project and subtask views.
//! - Provide lifecycle helpers for complete/drop/restore transitions.
//! - Describe inbox placement (tentative vs. resolved) as closed variants.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - A tentative target only exists while `project_id` and `parent_task_id`
//!   are both `None`.
//! - `completed_at` is set only for `Completed`, `dropped_at` only for `Dropped`.

use crate::model::project::ProjectId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable task identifier.
pub type TaskId = Uuid;

/// Maximum title length in characters.
pub const TASK_TITLE_MAX_CHARS: usize = 500;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Open and actionable (subject to availability rules).
    Active,
    /// Finished.
    Completed,
    /// No longer relevant.
    Dropped,
}

/// Speculative destination for an inbox item.
///
/// Exactly one destination kind can be proposed at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TentativeTarget {
    Project(ProjectId),
    ParentTask(TaskId),
}

/// Inbox placement state derived from a task's assignment fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxState {
    /// Inbox item with no proposed destination.
    Unassigned,
    /// Inbox item with one proposed destination.
    TentativelyAssigned(TentativeTarget),
    /// Task has a real project and/or parent task.
    Resolved,
}

/// Validation failures for task records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Title is blank after trim.
    EmptyTitle,
    /// Title exceeds [`TASK_TITLE_MAX_CHARS`].
    TitleTooLong(usize),
    /// Estimated duration must be positive minutes.
    NonPositiveEstimate(i64),
    /// Task lists itself as parent.
    SelfParent(TaskId),
    /// Tentative target set while a real assignment exists.
    TentativeOnResolvedTask(TaskId),
    /// Tentative parent points at the task itself.
    TentativeSelfParent(TaskId),
    /// Lifecycle timestamp does not match status.
    StatusTimestampMismatch {
        status: TaskStatus,
        field: &'static str,
    },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title must not be blank"),
            Self::TitleTooLong(len) => write!(
                f,
                "task title has {len} characters; maximum is {TASK_TITLE_MAX_CHARS}"
            ),
            Self::NonPositiveEstimate(value) => {
                write!(f, "estimated duration must be positive minutes, got {value}")
            }
            Self::SelfParent(id) => write!(f, "task cannot be its own parent: {id}"),
            Self::TentativeOnResolvedTask(id) => write!(
                f,
                "task {id} already has a project or parent; tentative target not allowed"
            ),
            Self::TentativeSelfParent(id) => {
                write!(f, "task cannot be tentatively assigned under itself: {id}")
            }
            Self::StatusTimestampMismatch { status, field } => {
                write!(f, "field `{field}` is inconsistent with status {status:?}")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub note: Option<String>,
    pub status: TaskStatus,
    pub flagged: bool,
    /// Minutes; positive when set.
    pub estimated_minutes: Option<i64>,
    /// Unix epoch milliseconds.
    pub due_date: Option<i64>,
    /// Unix epoch milliseconds.
    pub defer_date: Option<i64>,
    pub completed_at: Option<i64>,
    pub dropped_at: Option<i64>,
    /// `None` together with `parent_task_id == None` means inbox.
    pub project_id: Option<ProjectId>,
    pub parent_task_id: Option<TaskId>,
    /// Proposed destination while still in the inbox.
    pub tentative: Option<TentativeTarget>,
    /// Sibling order key; comparable, not necessarily contiguous.
    pub order: i64,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Task {
    /// Creates an active inbox task with a generated id.
    pub fn new(title: impl Into<String>, now: i64) -> Self {
        Self::with_id(Uuid::new_v4(), title, now)
    }

    /// Creates an active inbox task with a caller-provided id.
    pub fn with_id(id: TaskId, title: impl Into<String>, now: i64) -> Self {
        Self {
            id,
            title: title.into(),
            note: None,
            status: TaskStatus::Active,
            flagged: false,
            estimated_minutes: None,
            due_date: None,
            defer_date: None,
            completed_at: None,
            dropped_at: None,
            project_id: None,
            parent_task_id: None,
            tentative: None,
            order: 0,
            created_at: now,
            modified_at: now,
        }
    }

    /// Returns whether the task has neither a project nor a parent task.
    pub fn is_inbox(&self) -> bool {
        self.project_id.is_none() && self.parent_task_id.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active
    }

    /// Derives inbox placement state.
    pub fn inbox_state(&self) -> InboxState {
        if !self.is_inbox() {
            return InboxState::Resolved;
        }
        match self.tentative {
            Some(target) => InboxState::TentativelyAssigned(target),
            None => InboxState::Unassigned,
        }
    }

    pub fn complete(&mut self, now: i64) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        self.dropped_at = None;
        self.modified_at = now;
    }

    pub fn drop_task(&mut self, now: i64) {
        self.status = TaskStatus::Dropped;
        self.dropped_at = Some(now);
        self.completed_at = None;
        self.modified_at = now;
    }

    /// Returns the task to `Active` and clears lifecycle timestamps.
    pub fn restore(&mut self, now: i64) {
        self.status = TaskStatus::Active;
        self.completed_at = None;
        self.dropped_at = None;
        self.modified_at = now;
    }

    /// Validates record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_task_title(&self.title)?;
        if let Some(minutes) = self.estimated_minutes {
            if minutes <= 0 {
                return Err(TaskValidationError::NonPositiveEstimate(minutes));
            }
        }
        if self.parent_task_id == Some(self.id) {
            return Err(TaskValidationError::SelfParent(self.id));
        }
        if let Some(target) = self.tentative {
            if !self.is_inbox() {
                return Err(TaskValidationError::TentativeOnResolvedTask(self.id));
            }
            if target == TentativeTarget::ParentTask(self.id) {
                return Err(TaskValidationError::TentativeSelfParent(self.id));
            }
        }
        if self.completed_at.is_some() && self.status != TaskStatus::Completed {
            return Err(TaskValidationError::StatusTimestampMismatch {
                status: self.status,
                field: "completed_at",
            });
        }
        if self.dropped_at.is_some() && self.status != TaskStatus::Dropped {
            return Err(TaskValidationError::StatusTimestampMismatch {
                status: self.status,
                field: "dropped_at",
            });
        }
        Ok(())
    }
}

/// Checks a task title against length rules.
pub fn validate_task_title(title: &str) -> Result<(), TaskValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    let len = trimmed.chars().count();
    if len > TASK_TITLE_MAX_CHARS {
        return Err(TaskValidationError::TitleTooLong(len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{InboxState, Task, TaskStatus, TaskValidationError, TentativeTarget};
    use uuid::Uuid;

    #[test]
    fn new_task_is_active_unassigned_inbox_item() {
        let task = Task::new("buy milk", 10);
        assert_eq!(task.status, TaskStatus::Active);
        assert!(task.is_inbox());
        assert_eq!(task.inbox_state(), InboxState::Unassigned);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn tentative_target_on_resolved_task_is_rejected() {
        let mut task = Task::new("call bank", 0);
        task.project_id = Some(Uuid::new_v4());
        task.tentative = Some(TentativeTarget::Project(Uuid::new_v4()));
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::TentativeOnResolvedTask(task.id))
        );
        assert_eq!(task.inbox_state(), InboxState::Resolved);
    }

    #[test]
    fn lifecycle_transitions_keep_timestamps_consistent() {
        let mut task = Task::new("write report", 0);
        task.complete(5);
        assert_eq!(task.completed_at, Some(5));
        assert!(task.validate().is_ok());

        task.drop_task(6);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.dropped_at, Some(6));
        assert!(task.validate().is_ok());

        task.restore(7);
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.dropped_at, None);
        assert_eq!(task.modified_at, 7);
    }

    #[test]
    fn blank_and_oversized_titles_are_rejected() {
        let task = Task::new("   ", 0);
        assert_eq!(task.validate(), Err(TaskValidationError::EmptyTitle));

        let task = Task::new("x".repeat(501), 0);
        assert_eq!(task.validate(), Err(TaskValidationError::TitleTooLong(501)));
    }

    #[test]
    fn tentative_target_serializes_as_tagged_value() {
        let id = Uuid::nil();
        let value = serde_json::to_value(TentativeTarget::ParentTask(id)).unwrap();
        assert_eq!(value["kind"], "parent_task");
        assert_eq!(value["id"], id.to_string());
    }
}
