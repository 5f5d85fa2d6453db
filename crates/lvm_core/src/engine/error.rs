//! Engine error taxonomy.
//!
//! All engine errors are local computation failures. None are transient.

use crate::model::task::TaskId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type EngineResult<T> = Result<T, EngineError>;

/// Which self-referential hierarchy a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyKind {
    Task,
    Project,
    Folder,
    Tag,
}

impl Display for HierarchyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Task => "task",
            Self::Project => "project",
            Self::Folder => "folder",
            Self::Tag => "tag",
        };
        f.write_str(label)
    }
}

/// How the engine treats references to rows missing from the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Missing ancestor or project contributes nothing.
    #[default]
    Ignore,
    /// Missing ancestor or project yields [`EngineError::OrphanedReference`].
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Parent chain revisits `node`.
    CyclicHierarchy { kind: HierarchyKind, node: Uuid },
    /// `from` references `missing` of kind `kind`, which is not in the snapshot.
    OrphanedReference {
        kind: HierarchyKind,
        from: Uuid,
        missing: Uuid,
    },
    /// Tentative transitions apply to inbox items only.
    NotInInbox(TaskId),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CyclicHierarchy { kind, node } => {
                write!(f, "cyclic {kind} hierarchy detected at {node}")
            }
            Self::OrphanedReference {
                kind,
                from,
                missing,
            } => write!(f, "{from} references missing {kind} {missing}"),
            Self::NotInInbox(id) => write!(f, "task is not an inbox item: {id}"),
        }
    }
}

impl Error for EngineError {}
