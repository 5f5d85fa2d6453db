//! Core domain logic for the task availability backend.
//!
//! The `engine` module is pure evaluation over a task/project snapshot; the
//! `db`, `repo` and `service` layers load snapshots from SQLite and persist
//! mutations.

pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, Connection, DbError, DbResult};
pub use engine::{
    evaluate, Availability, BlockingReason, EngineError, EngineResult, EvaluationOptions,
    OrphanPolicy, TaskSnapshot, TaskView,
};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::folder::{Folder, FolderId, FolderStatus};
pub use model::project::{Project, ProjectId, ProjectStatus, ProjectType};
pub use model::tag::{Tag, TagId, TagLocation, TagStatus};
pub use model::task::{InboxState, Task, TaskId, TaskStatus, TentativeTarget};
pub use model::ValidationError;
pub use repo::{EntityKind, ParentFilter, RepoError, RepoResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
