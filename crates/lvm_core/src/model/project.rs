//! Project domain model.
//!
//! # Responsibility
//! - Define project records, lifecycle status and ordering type.
//! - Provide lifecycle helpers and review scheduling checks.
//!
//! # Invariants
//! - `auto_complete` defaults to `false` only for `SingleActions` projects.
//! - `review_interval_days` is positive when set.

use crate::model::folder::FolderId;
use crate::model::task::{validate_task_title, Task, TaskValidationError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable project identifier.
pub type ProjectId = Uuid;

/// Default review cadence for new projects.
pub const DEFAULT_REVIEW_INTERVAL_DAYS: i64 = 7;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Project lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    /// Paused; every contained task is blocked.
    OnHold,
    Completed,
    Dropped,
}

/// Controls how contained tasks become available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    /// All tasks can be worked in any order.
    Parallel,
    /// Only the first unfinished task is actionable.
    Sequential,
    /// Loose list of unrelated actions; never completes automatically.
    SingleActions,
}

impl ProjectType {
    /// Default `auto_complete` value for newly created projects of this type.
    pub fn default_auto_complete(self) -> bool {
        self != ProjectType::SingleActions
    }
}

/// Validation failures for project records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectValidationError {
    Title(TaskValidationError),
    NonPositiveReviewInterval(i64),
}

impl Display for ProjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title(err) => write!(f, "invalid project title: {err}"),
            Self::NonPositiveReviewInterval(days) => {
                write!(f, "review interval must be positive days, got {days}")
            }
        }
    }
}

impl Error for ProjectValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Title(err) => Some(err),
            Self::NonPositiveReviewInterval(_) => None,
        }
    }
}

/// Canonical project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub note: Option<String>,
    pub status: ProjectStatus,
    #[serde(rename = "type")]
    pub kind: ProjectType,
    pub flagged: bool,
    /// Unix epoch milliseconds.
    pub due_date: Option<i64>,
    /// Unix epoch milliseconds.
    pub defer_date: Option<i64>,
    pub completed_at: Option<i64>,
    pub dropped_at: Option<i64>,
    pub folder_id: Option<FolderId>,
    pub review_interval_days: Option<i64>,
    pub last_reviewed_at: Option<i64>,
    pub auto_complete: bool,
    pub order: i64,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Project {
    /// Creates an active project with type-dependent defaults.
    pub fn new(title: impl Into<String>, kind: ProjectType, now: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            note: None,
            status: ProjectStatus::Active,
            kind,
            flagged: false,
            due_date: None,
            defer_date: None,
            completed_at: None,
            dropped_at: None,
            folder_id: None,
            review_interval_days: Some(DEFAULT_REVIEW_INTERVAL_DAYS),
            last_reviewed_at: None,
            auto_complete: kind.default_auto_complete(),
            order: 0,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }

    pub fn complete(&mut self, now: i64) {
        self.status = ProjectStatus::Completed;
        self.completed_at = Some(now);
        self.dropped_at = None;
        self.modified_at = now;
    }

    pub fn drop_project(&mut self, now: i64) {
        self.status = ProjectStatus::Dropped;
        self.dropped_at = Some(now);
        self.completed_at = None;
        self.modified_at = now;
    }

    pub fn hold(&mut self, now: i64) {
        self.status = ProjectStatus::OnHold;
        self.modified_at = now;
    }

    /// Restores from any non-active state.
    pub fn activate(&mut self, now: i64) {
        self.status = ProjectStatus::Active;
        self.completed_at = None;
        self.dropped_at = None;
        self.modified_at = now;
    }

    /// Returns whether the next review is due at `now`.
    ///
    /// Never-reviewed projects are measured from `created_at`; projects with
    /// no interval are never due.
    pub fn is_due_for_review(&self, now: i64) -> bool {
        let Some(days) = self.review_interval_days else {
            return false;
        };
        let since = self.last_reviewed_at.unwrap_or(self.created_at);
        since.saturating_add(days.saturating_mul(MILLIS_PER_DAY)) <= now
    }

    pub fn validate(&self) -> Result<(), ProjectValidationError> {
        validate_task_title(&self.title).map_err(ProjectValidationError::Title)?;
        if let Some(days) = self.review_interval_days {
            if days <= 0 {
                return Err(ProjectValidationError::NonPositiveReviewInterval(days));
            }
        }
        Ok(())
    }
}

/// New-project draft produced from an inbox item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDraft {
    pub title: String,
    pub note: Option<String>,
    pub kind: ProjectType,
    pub flagged: bool,
    pub due_date: Option<i64>,
    pub defer_date: Option<i64>,
    pub auto_complete: bool,
}

impl ProjectDraft {
    /// Copies title, note, flag and dates from `task`.
    ///
    /// `kind` defaults to `Parallel`.
    pub fn from_inbox_task(task: &Task, kind: Option<ProjectType>) -> Self {
        let kind = kind.unwrap_or(ProjectType::Parallel);
        Self {
            title: task.title.clone(),
            note: task.note.clone(),
            kind,
            flagged: task.flagged,
            due_date: task.due_date,
            defer_date: task.defer_date,
            auto_complete: kind.default_auto_complete(),
        }
    }

    /// Materializes the draft as a project record.
    pub fn into_project(self, now: i64) -> Project {
        let mut project = Project::new(self.title, self.kind, now);
        project.note = self.note;
        project.flagged = self.flagged;
        project.due_date = self.due_date;
        project.defer_date = self.defer_date;
        project.auto_complete = self.auto_complete;
        project
    }
}

#[cfg(test)]
mod tests {
    use super::{Project, ProjectDraft, ProjectType, MILLIS_PER_DAY};
    use crate::model::task::Task;

    #[test]
    fn single_actions_projects_do_not_auto_complete() {
        assert!(Project::new("p", ProjectType::Parallel, 0).auto_complete);
        assert!(Project::new("p", ProjectType::Sequential, 0).auto_complete);
        assert!(!Project::new("p", ProjectType::SingleActions, 0).auto_complete);
    }

    #[test]
    fn review_is_due_after_interval_elapses() {
        let mut project = Project::new("garden", ProjectType::Parallel, 0);
        assert!(!project.is_due_for_review(7 * MILLIS_PER_DAY - 1));
        assert!(project.is_due_for_review(7 * MILLIS_PER_DAY));

        project.last_reviewed_at = Some(7 * MILLIS_PER_DAY);
        assert!(!project.is_due_for_review(7 * MILLIS_PER_DAY));

        project.review_interval_days = None;
        assert!(!project.is_due_for_review(i64::MAX));
    }

    #[test]
    fn draft_copies_inbox_fields() {
        let mut task = Task::new("plan trip", 0);
        task.note = Some("flights".to_string());
        task.flagged = true;
        task.due_date = Some(100);
        task.defer_date = Some(50);

        let draft = ProjectDraft::from_inbox_task(&task, None);
        assert_eq!(draft.kind, ProjectType::Parallel);
        assert!(draft.auto_complete);
        let project = draft.into_project(1);
        assert_eq!(project.title, "plan trip");
        assert_eq!(project.note.as_deref(), Some("flights"));
        assert!(project.flagged);
        assert_eq!(project.due_date, Some(100));
        assert_eq!(project.defer_date, Some(50));

        let draft = ProjectDraft::from_inbox_task(&task, Some(ProjectType::SingleActions));
        assert!(!draft.auto_complete);
    }
}
