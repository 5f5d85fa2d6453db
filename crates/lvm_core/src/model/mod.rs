//! Domain model for tasks, projects, folders and tags.
//!
//! # Responsibility
//! - Define canonical records used by engine, repositories and services.
//! - Keep record-level validation next to the data it guards.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Instants are Unix epoch milliseconds.

pub mod folder;
pub mod project;
pub mod tag;
pub mod task;

use folder::NameValidationError;
use project::ProjectValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tag::TagValidationError;
use task::TaskValidationError;

/// Validation failure of any record kind, as surfaced by write paths.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Task(TaskValidationError),
    Project(ProjectValidationError),
    Folder(NameValidationError),
    Tag(TagValidationError),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task(err) => write!(f, "{err}"),
            Self::Project(err) => write!(f, "{err}"),
            Self::Folder(err) => write!(f, "invalid folder name: {err}"),
            Self::Tag(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Task(err) => Some(err),
            Self::Project(err) => Some(err),
            Self::Folder(err) => Some(err),
            Self::Tag(err) => Some(err),
        }
    }
}

impl From<TaskValidationError> for ValidationError {
    fn from(value: TaskValidationError) -> Self {
        Self::Task(value)
    }
}

impl From<ProjectValidationError> for ValidationError {
    fn from(value: ProjectValidationError) -> Self {
        Self::Project(value)
    }
}

impl From<NameValidationError> for ValidationError {
    fn from(value: NameValidationError) -> Self {
        Self::Folder(value)
    }
}

impl From<TagValidationError> for ValidationError {
    fn from(value: TagValidationError) -> Self {
        Self::Tag(value)
    }
}
