//! Folder domain model.
//!
//! Folders organize projects only. They carry no dates and take no part in
//! date inheritance.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable folder identifier.
pub type FolderId = Uuid;

pub const FOLDER_NAME_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderStatus {
    Active,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameValidationError {
    Empty,
    TooLong { len: usize, max: usize },
}

impl Display for NameValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "name must not be blank"),
            Self::TooLong { len, max } => {
                write!(f, "name has {len} characters; maximum is {max}")
            }
        }
    }
}

impl Error for NameValidationError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub status: FolderStatus,
    /// `None` means root-level folder.
    pub parent_id: Option<FolderId>,
    pub order: i64,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Folder {
    pub fn new(name: impl Into<String>, parent_id: Option<FolderId>, now: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: FolderStatus::Active,
            parent_id,
            order: 0,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), NameValidationError> {
        normalize_name(&self.name, FOLDER_NAME_MAX_CHARS).map(|_| ())
    }
}

/// Trims `value` and checks it against `max` characters.
pub fn normalize_name(value: &str, max: usize) -> Result<String, NameValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NameValidationError::Empty);
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(NameValidationError::TooLong { len, max });
    }
    Ok(trimmed.to_string())
}
