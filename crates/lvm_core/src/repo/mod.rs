//! Repository layer: SQL persistence per entity.
//!
//! # Responsibility
//! - Define data access contracts consumed by services.
//! - Keep SQL text and row mapping inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call the record's `validate()` before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Task and project listings use `sort_order ASC, created_at DESC, id ASC`;
//!   folder and tag listings use `sort_order ASC, name ASC, id ASC`.
//! - Repositories only accept connections at the latest schema version.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::folder::NameValidationError;
use crate::model::project::ProjectValidationError;
use crate::model::tag::TagValidationError;
use crate::model::task::TaskValidationError;
use crate::model::ValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod folder_repo;
pub mod project_repo;
pub mod tag_repo;
pub mod task_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Persisted record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Project,
    Folder,
    Tag,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Task => "task",
            Self::Project => "project",
            Self::Folder => "folder",
            Self::Tag => "tag",
        })
    }
}

/// Repository failure shared by all entity repositories.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { kind: EntityKind, id: Uuid },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted into a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value.into())
    }
}

impl From<ProjectValidationError> for RepoError {
    fn from(value: ProjectValidationError) -> Self {
        Self::Validation(value.into())
    }
}

impl From<NameValidationError> for RepoError {
    fn from(value: NameValidationError) -> Self {
        Self::Validation(value.into())
    }
}

impl From<TagValidationError> for RepoError {
    fn from(value: TagValidationError) -> Self {
        Self::Validation(value.into())
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub(crate) fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    /// Returns the missing id when this is a `NotFound` of `kind`.
    pub fn missing(&self, kind: EntityKind) -> Option<Uuid> {
        match self {
            Self::NotFound { kind: found, id } if *found == kind => Some(*id),
            _ => None,
        }
    }
}

/// Checks schema version and required tables before a repository is handed out.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    column: &'static str,
) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

pub(crate) fn parse_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

pub(crate) fn uuid_text(value: Option<Uuid>) -> Option<String> {
    value.map(|id| id.to_string())
}

/// `ORDER BY` clause for task and project listings.
pub(crate) const SIBLING_ORDER_SQL: &str = "ORDER BY sort_order ASC, created_at DESC, id ASC";

/// `ORDER BY` clause for folder and tag listings.
pub(crate) const NAMED_ORDER_SQL: &str = "ORDER BY sort_order ASC, name ASC, id ASC";

/// Position filter over a self-referential or containing hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentFilter<Id> {
    /// Top-level rows only.
    Root,
    /// Direct children of `Id`.
    Under(Id),
}
