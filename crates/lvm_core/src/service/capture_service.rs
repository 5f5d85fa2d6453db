//! Capture intake: turns extracted candidate records into tasks.
//!
//! # Responsibility
//! - Parse ISO-8601 date strings of candidate records into epoch milliseconds.
//! - Create ordinary tasks and attach the named tags.
//!
//! # Invariants
//! - Every candidate is parsed and validated before the first write.
//! - The whole batch is written in one transaction.
//! - A candidate keeps at most one child of a mutually exclusive tag; the
//!   last one listed wins, as with attaching the tags one by one.
//! - Date-only strings mean midnight UTC; date-times without offset are UTC.

use crate::model::project::ProjectId;
use crate::model::tag::TagId;
use crate::model::task::Task;
use crate::model::ValidationError;
use crate::repo::project_repo::ProjectRepository;
use crate::repo::tag_repo::TagRepository;
use crate::repo::task_repo::TaskRepository;
use crate::repo::RepoError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One candidate task produced by an upstream extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTask {
    pub title: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub defer_date: Option<String>,
    #[serde(default)]
    pub estimated_minutes: Option<i64>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

/// Result of one intake batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
    pub tasks: Vec<Task>,
    pub count: usize,
}

#[derive(Debug)]
pub enum CaptureServiceError {
    InvalidDate {
        field: &'static str,
        value: String,
    },
    ProjectNotFound(ProjectId),
    TagNotFound(TagId),
    Validation(ValidationError),
    Repo(RepoError),
}

impl Display for CaptureServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate { field, value } => {
                write!(f, "invalid {field} `{value}`: expected ISO-8601 date")
            }
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CaptureServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CaptureServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureServiceError>;

/// Capture intake facade.
pub struct CaptureService<T: TaskRepository, P: ProjectRepository, G: TagRepository> {
    tasks: T,
    projects: P,
    tags: G,
}

impl<T: TaskRepository, P: ProjectRepository, G: TagRepository> CaptureService<T, P, G> {
    pub fn new(tasks: T, projects: P, tags: G) -> Self {
        Self {
            tasks,
            projects,
            tags,
        }
    }

    /// Creates one task per candidate, in input order.
    pub fn create_from_extraction(
        &self,
        candidates: Vec<ExtractedTask>,
        now: i64,
    ) -> CaptureResult<CaptureOutcome> {
        let mut prepared = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let task = self.prepare(candidate, now)?;
            let tag_ids = self.resolve_tags(&candidate.tag_ids)?;
            prepared.push((task, tag_ids));
        }

        self.tasks.create_tasks_with_tags(&prepared, now)?;
        let created: Vec<Task> = prepared.into_iter().map(|(task, _)| task).collect();

        info!(
            "event=capture_intake module=service status=ok count={}",
            created.len()
        );
        Ok(CaptureOutcome {
            count: created.len(),
            tasks: created,
        })
    }

    fn prepare(&self, candidate: &ExtractedTask, now: i64) -> CaptureResult<Task> {
        let mut task = Task::new(candidate.title.trim(), now);
        task.note = candidate.note.clone();
        task.due_date = parse_optional_date("due_date", candidate.due_date.as_deref())?;
        task.defer_date = parse_optional_date("defer_date", candidate.defer_date.as_deref())?;
        task.estimated_minutes = candidate.estimated_minutes;
        task.project_id = candidate.project_id;
        task.validate()
            .map_err(|err| CaptureServiceError::Validation(err.into()))?;

        if let Some(project_id) = candidate.project_id {
            if self.projects.get_project(project_id)?.is_none() {
                return Err(CaptureServiceError::ProjectNotFound(project_id));
            }
        }
        Ok(task)
    }

    /// Checks every tag exists and drops exclusive siblings superseded by a
    /// later entry. Duplicates collapse to their last position.
    fn resolve_tags(&self, tag_ids: &[TagId]) -> CaptureResult<Vec<TagId>> {
        let mut kept: Vec<TagId> = Vec::with_capacity(tag_ids.len());
        for tag_id in tag_ids {
            let tag = self
                .tags
                .get_tag(*tag_id)?
                .ok_or(CaptureServiceError::TagNotFound(*tag_id))?;
            let replaced = self.tags.exclusive_siblings(&tag)?;
            kept.retain(|id| *id != tag.id && !replaced.contains(id));
            kept.push(tag.id);
        }
        Ok(kept)
    }
}

fn parse_optional_date(field: &'static str, value: Option<&str>) -> CaptureResult<Option<i64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_iso_date(text)
            .map(Some)
            .ok_or_else(|| CaptureServiceError::InvalidDate {
                field,
                value: text.to_string(),
            }),
    }
}

/// Parses an ISO-8601 date or date-time into epoch milliseconds.
pub fn parse_iso_date(text: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::parse_iso_date;

    const JAN_15_2024: i64 = 1_705_276_800_000;

    #[test]
    fn date_only_strings_mean_midnight_utc() {
        assert_eq!(parse_iso_date("2024-01-15"), Some(JAN_15_2024));
    }

    #[test]
    fn offsets_are_honoured_and_naive_times_are_utc() {
        assert_eq!(parse_iso_date("2024-01-15T00:00:00Z"), Some(JAN_15_2024));
        assert_eq!(
            parse_iso_date("2024-01-15T02:00:00+02:00"),
            Some(JAN_15_2024)
        );
        assert_eq!(
            parse_iso_date("2024-01-15T10:30:00"),
            Some(JAN_15_2024 + (10 * 60 + 30) * 60 * 1000)
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_iso_date("next tuesday"), None);
        assert_eq!(parse_iso_date("2024-13-01"), None);
    }
}
