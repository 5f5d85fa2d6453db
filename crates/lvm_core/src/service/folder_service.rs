//! Folder use-case service.
//!
//! # Invariants
//! - Parent folder must exist when provided.
//! - Move operations must not create parent-child cycles.

use crate::engine::{HierarchyKind, ParentIndex};
use crate::model::folder::{
    normalize_name, Folder, FolderId, FolderStatus, FOLDER_NAME_MAX_CHARS,
};
use crate::model::ValidationError;
use crate::repo::folder_repo::{FolderListQuery, FolderRepository, FolderStats};
use crate::repo::{EntityKind, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum FolderServiceError {
    FolderNotFound(FolderId),
    ParentNotFound(FolderId),
    CycleDetected {
        folder_id: FolderId,
        parent_id: FolderId,
    },
    Validation(ValidationError),
    Repo(RepoError),
}

impl Display for FolderServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FolderNotFound(id) => write!(f, "folder not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent folder not found: {id}"),
            Self::CycleDetected {
                folder_id,
                parent_id,
            } => write!(
                f,
                "move would create cycle: folder {folder_id} under parent {parent_id}"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FolderServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for FolderServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                kind: EntityKind::Folder,
                id,
            } => Self::FolderNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type FolderServiceResult<T> = Result<T, FolderServiceError>;

/// Folder service facade.
pub struct FolderService<F: FolderRepository> {
    repo: F,
}

impl<F: FolderRepository> FolderService<F> {
    pub fn new(repo: F) -> Self {
        Self { repo }
    }

    pub fn create_folder(
        &self,
        name: &str,
        parent_id: Option<FolderId>,
        now: i64,
    ) -> FolderServiceResult<Folder> {
        let name = normalize(name)?;
        if let Some(parent_id) = parent_id {
            self.require_parent(parent_id)?;
        }
        let folder = Folder::new(name, parent_id, now);
        self.repo.create_folder(&folder)?;
        Ok(folder)
    }

    pub fn get_folder(&self, id: FolderId) -> FolderServiceResult<Folder> {
        self.repo
            .get_folder(id)?
            .ok_or(FolderServiceError::FolderNotFound(id))
    }

    pub fn list_folders(&self, query: &FolderListQuery) -> FolderServiceResult<Vec<Folder>> {
        self.repo.list_folders(query).map_err(Into::into)
    }

    /// Subfolder, project and task counts for a folder.
    pub fn folder_stats(&self, id: FolderId) -> FolderServiceResult<FolderStats> {
        self.get_folder(id)?;
        self.repo.folder_stats(id).map_err(Into::into)
    }

    pub fn rename_folder(
        &self,
        id: FolderId,
        name: &str,
        now: i64,
    ) -> FolderServiceResult<Folder> {
        let name = normalize(name)?;
        self.transition(id, now, |folder| folder.name = name)
    }

    pub fn drop_folder(&self, id: FolderId, now: i64) -> FolderServiceResult<Folder> {
        self.transition(id, now, |folder| folder.status = FolderStatus::Dropped)
    }

    pub fn activate_folder(&self, id: FolderId, now: i64) -> FolderServiceResult<Folder> {
        self.transition(id, now, |folder| folder.status = FolderStatus::Active)
    }

    /// Moves a folder under `parent_id` (or to the root) at `position`.
    pub fn move_folder(
        &self,
        id: FolderId,
        parent_id: Option<FolderId>,
        position: Option<i64>,
        now: i64,
    ) -> FolderServiceResult<Folder> {
        self.get_folder(id)?;
        if let Some(parent_id) = parent_id {
            self.require_parent(parent_id)?;
            let index = ParentIndex::new(HierarchyKind::Folder, self.repo.parent_links()?);
            index
                .ensure_can_reparent(id, Some(parent_id))
                .map_err(|_| FolderServiceError::CycleDetected {
                    folder_id: id,
                    parent_id,
                })?;
        }
        self.transition(id, now, |folder| {
            folder.parent_id = parent_id;
            folder.order = position.unwrap_or(0);
        })
    }

    /// Deletes a folder. Without `recursive`, subfolders move to its parent.
    pub fn delete_folder(
        &self,
        id: FolderId,
        recursive: bool,
        now: i64,
    ) -> FolderServiceResult<()> {
        self.repo
            .delete_folder(id, recursive, now)
            .map_err(Into::into)
    }

    fn transition(
        &self,
        id: FolderId,
        now: i64,
        apply: impl FnOnce(&mut Folder),
    ) -> FolderServiceResult<Folder> {
        let mut folder = self.get_folder(id)?;
        apply(&mut folder);
        folder.modified_at = now;
        self.repo.update_folder(&folder)?;
        Ok(folder)
    }

    fn require_parent(&self, parent_id: FolderId) -> FolderServiceResult<()> {
        match self.repo.get_folder(parent_id)? {
            Some(_) => Ok(()),
            None => Err(FolderServiceError::ParentNotFound(parent_id)),
        }
    }
}

fn normalize(name: &str) -> FolderServiceResult<String> {
    normalize_name(name, FOLDER_NAME_MAX_CHARS)
        .map_err(|err| FolderServiceError::Validation(err.into()))
}
