//! Tag use-case service.
//!
//! # Responsibility
//! - Maintain the tag hierarchy (create, rename, status, move, delete).
//! - Attach and detach tags on tasks and projects.
//!
//! # Invariants
//! - Move operations must not create parent-child cycles.
//! - A task never holds two children of a `children_mutually_exclusive` tag;
//!   attaching one detaches its siblings in the same transaction.

use crate::engine::{HierarchyKind, ParentIndex};
use crate::model::folder::normalize_name;
use crate::model::project::ProjectId;
use crate::model::tag::{
    Tag, TagId, TagLocation, TagStatus, TagValidationError, TAG_NAME_MAX_CHARS,
};
use crate::model::task::TaskId;
use crate::model::ValidationError;
use crate::repo::project_repo::ProjectRepository;
use crate::repo::tag_repo::{TagListQuery, TagOwner, TagRepository};
use crate::repo::task_repo::TaskRepository;
use crate::repo::{EntityKind, RepoError};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum TagServiceError {
    TagNotFound(TagId),
    ParentNotFound(TagId),
    TaskNotFound(TaskId),
    ProjectNotFound(ProjectId),
    CycleDetected { tag_id: TagId, parent_id: TagId },
    Validation(ValidationError),
    Repo(RepoError),
}

impl Display for TagServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent tag not found: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::CycleDetected { tag_id, parent_id } => write!(
                f,
                "move would create cycle: tag {tag_id} under parent {parent_id}"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TagServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TagServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                kind: EntityKind::Tag,
                id,
            } => Self::TagNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type TagServiceResult<T> = Result<T, TagServiceError>;

/// Input for [`TagService::create_tag`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTag {
    pub name: String,
    pub parent_id: Option<TagId>,
    /// Defaults to `true`.
    pub allows_next_action: Option<bool>,
    pub children_mutually_exclusive: bool,
    pub location: Option<TagLocation>,
}

/// Tag service facade.
pub struct TagService<G: TagRepository, T: TaskRepository, P: ProjectRepository> {
    tags: G,
    tasks: T,
    projects: P,
}

impl<G: TagRepository, T: TaskRepository, P: ProjectRepository> TagService<G, T, P> {
    pub fn new(tags: G, tasks: T, projects: P) -> Self {
        Self {
            tags,
            tasks,
            projects,
        }
    }

    pub fn create_tag(&self, input: NewTag, now: i64) -> TagServiceResult<Tag> {
        let name = normalize(&input.name)?;
        if let Some(parent_id) = input.parent_id {
            self.require_parent(parent_id)?;
        }
        let mut tag = Tag::new(name, input.parent_id, now);
        if let Some(allows) = input.allows_next_action {
            tag.allows_next_action = allows;
        }
        tag.children_mutually_exclusive = input.children_mutually_exclusive;
        tag.location = input.location;
        self.tags.create_tag(&tag)?;
        Ok(tag)
    }

    pub fn get_tag(&self, id: TagId) -> TagServiceResult<Tag> {
        self.tags.get_tag(id)?.ok_or(TagServiceError::TagNotFound(id))
    }

    pub fn list_tags(&self, query: &TagListQuery) -> TagServiceResult<Vec<Tag>> {
        self.tags.list_tags(query).map_err(Into::into)
    }

    pub fn list_location_tags(&self) -> TagServiceResult<Vec<Tag>> {
        self.tags.list_location_tags().map_err(Into::into)
    }

    /// Writes flag and location changes made to a fetched tag.
    pub fn update_tag(&self, mut tag: Tag, now: i64) -> TagServiceResult<Tag> {
        let stored = self.get_tag(tag.id)?;
        if tag.parent_id != stored.parent_id {
            self.ensure_can_move(tag.id, tag.parent_id)?;
        }
        tag.modified_at = now;
        self.tags.update_tag(&tag)?;
        Ok(tag)
    }

    pub fn rename_tag(&self, id: TagId, name: &str, now: i64) -> TagServiceResult<Tag> {
        let name = normalize(name)?;
        self.transition(id, now, |tag| tag.name = name)
    }

    pub fn set_tag_status(
        &self,
        id: TagId,
        status: TagStatus,
        now: i64,
    ) -> TagServiceResult<Tag> {
        self.transition(id, now, |tag| tag.status = status)
    }

    /// Moves a tag under `parent_id` (or to the root) at `position`.
    pub fn move_tag(
        &self,
        id: TagId,
        parent_id: Option<TagId>,
        position: Option<i64>,
        now: i64,
    ) -> TagServiceResult<Tag> {
        self.get_tag(id)?;
        self.ensure_can_move(id, parent_id)?;
        self.transition(id, now, |tag| {
            tag.parent_id = parent_id;
            tag.order = position.unwrap_or(0);
        })
    }

    /// Deletes a tag. Without `delete_children`, child tags move to its parent.
    pub fn delete_tag(
        &self,
        id: TagId,
        delete_children: bool,
        now: i64,
    ) -> TagServiceResult<()> {
        self.tags
            .delete_tag(id, delete_children, now)
            .map_err(Into::into)
    }

    /// Attaches `tag_id` to a task, replacing mutually exclusive siblings.
    pub fn add_tag_to_task(
        &self,
        task_id: TaskId,
        tag_id: TagId,
        now: i64,
    ) -> TagServiceResult<()> {
        if self.tasks.get_task(task_id)?.is_none() {
            return Err(TagServiceError::TaskNotFound(task_id));
        }
        let tag = self.get_tag(tag_id)?;
        let replaced = self.tags.exclusive_siblings(&tag)?;
        if !replaced.is_empty() {
            debug!(
                "event=tag_attach module=service status=exclusive task_id={} tag_id={} siblings={}",
                task_id,
                tag_id,
                replaced.len()
            );
        }
        self.tags
            .attach_tag(TagOwner::Task(task_id), tag_id, &replaced, now)
            .map_err(Into::into)
    }

    /// Returns whether the tag was attached.
    pub fn remove_tag_from_task(
        &self,
        task_id: TaskId,
        tag_id: TagId,
    ) -> TagServiceResult<bool> {
        self.tags
            .detach_tag(TagOwner::Task(task_id), tag_id)
            .map_err(Into::into)
    }

    pub fn add_tag_to_project(
        &self,
        project_id: ProjectId,
        tag_id: TagId,
        now: i64,
    ) -> TagServiceResult<()> {
        if self.projects.get_project(project_id)?.is_none() {
            return Err(TagServiceError::ProjectNotFound(project_id));
        }
        self.get_tag(tag_id)?;
        self.tags
            .attach_tag(TagOwner::Project(project_id), tag_id, &[], now)
            .map_err(Into::into)
    }

    pub fn remove_tag_from_project(
        &self,
        project_id: ProjectId,
        tag_id: TagId,
    ) -> TagServiceResult<bool> {
        self.tags
            .detach_tag(TagOwner::Project(project_id), tag_id)
            .map_err(Into::into)
    }

    pub fn task_tags(&self, task_id: TaskId) -> TagServiceResult<Vec<Tag>> {
        self.tags
            .owner_tags(TagOwner::Task(task_id))
            .map_err(Into::into)
    }

    pub fn project_tags(&self, project_id: ProjectId) -> TagServiceResult<Vec<Tag>> {
        self.tags
            .owner_tags(TagOwner::Project(project_id))
            .map_err(Into::into)
    }

    fn ensure_can_move(&self, id: TagId, parent_id: Option<TagId>) -> TagServiceResult<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        self.require_parent(parent_id)?;
        let index = ParentIndex::new(HierarchyKind::Tag, self.tags.parent_links()?);
        index
            .ensure_can_reparent(id, Some(parent_id))
            .map_err(|_| TagServiceError::CycleDetected {
                tag_id: id,
                parent_id,
            })
    }

    fn transition(
        &self,
        id: TagId,
        now: i64,
        apply: impl FnOnce(&mut Tag),
    ) -> TagServiceResult<Tag> {
        let mut tag = self.get_tag(id)?;
        apply(&mut tag);
        tag.modified_at = now;
        self.tags.update_tag(&tag)?;
        Ok(tag)
    }

    fn require_parent(&self, parent_id: TagId) -> TagServiceResult<()> {
        match self.tags.get_tag(parent_id)? {
            Some(_) => Ok(()),
            None => Err(TagServiceError::ParentNotFound(parent_id)),
        }
    }
}

fn normalize(name: &str) -> TagServiceResult<String> {
    normalize_name(name, TAG_NAME_MAX_CHARS)
        .map_err(|err| TagServiceError::Validation(TagValidationError::Name(err).into()))
}
