//! Project use-case service.
//!
//! # Responsibility
//! - Apply project creation defaults and lifecycle transitions.
//! - Filter listings by availability and review schedule.
//!
//! # Invariants
//! - Target folders must exist before a project is moved into them.
//! - `activate` clears completion and drop timestamps.
//! - Deleting a project keeps its tasks (moved to the inbox) unless asked.

use crate::model::folder::FolderId;
use crate::model::project::{Project, ProjectId, ProjectType};
use crate::repo::folder_repo::FolderRepository;
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository};
use crate::repo::{EntityKind, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ProjectServiceError {
    ProjectNotFound(ProjectId),
    FolderNotFound(FolderId),
    Repo(RepoError),
}

impl Display for ProjectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::FolderNotFound(id) => write!(f, "folder not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProjectServiceError {
    fn from(value: RepoError) -> Self {
        if let Some(id) = value.missing(EntityKind::Project) {
            return Self::ProjectNotFound(id);
        }
        if let Some(id) = value.missing(EntityKind::Folder) {
            return Self::FolderNotFound(id);
        }
        Self::Repo(value)
    }
}

pub type ProjectServiceResult<T> = Result<T, ProjectServiceError>;

/// Input for [`ProjectService::create_project`]. Unset options take defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProject {
    pub title: String,
    pub note: Option<String>,
    /// Defaults to `Parallel`.
    pub kind: Option<ProjectType>,
    pub flagged: bool,
    pub due_date: Option<i64>,
    pub defer_date: Option<i64>,
    pub folder_id: Option<FolderId>,
    /// Defaults to `kind != SingleActions`.
    pub auto_complete: Option<bool>,
    /// Defaults to seven days.
    pub review_interval_days: Option<i64>,
}

/// Listing request; repository filters plus service-side predicates.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub query: ProjectListQuery,
    /// Keep only projects whose review is due at this instant.
    pub due_for_review_at: Option<i64>,
}

/// Project service facade.
pub struct ProjectService<P: ProjectRepository, F: FolderRepository> {
    projects: P,
    folders: F,
}

impl<P: ProjectRepository, F: FolderRepository> ProjectService<P, F> {
    pub fn new(projects: P, folders: F) -> Self {
        Self { projects, folders }
    }

    pub fn create_project(&self, input: NewProject, now: i64) -> ProjectServiceResult<Project> {
        if let Some(folder_id) = input.folder_id {
            self.require_folder(folder_id)?;
        }
        let kind = input.kind.unwrap_or(ProjectType::Parallel);
        let mut project = Project::new(input.title, kind, now);
        project.note = input.note;
        project.flagged = input.flagged;
        project.due_date = input.due_date;
        project.defer_date = input.defer_date;
        project.folder_id = input.folder_id;
        if let Some(auto_complete) = input.auto_complete {
            project.auto_complete = auto_complete;
        }
        if input.review_interval_days.is_some() {
            project.review_interval_days = input.review_interval_days;
        }
        self.projects.create_project(&project)?;
        Ok(project)
    }

    pub fn get_project(&self, id: ProjectId) -> ProjectServiceResult<Project> {
        self.projects
            .get_project(id)?
            .ok_or(ProjectServiceError::ProjectNotFound(id))
    }

    pub fn list_projects(&self, filter: &ProjectFilter) -> ProjectServiceResult<Vec<Project>> {
        let mut projects = self.projects.list_projects(&filter.query)?;
        if let Some(now) = filter.due_for_review_at {
            projects.retain(|project| project.is_due_for_review(now));
        }
        Ok(projects)
    }

    /// Writes `project` as given; stamps `modified_at`.
    pub fn update_project(&self, mut project: Project, now: i64) -> ProjectServiceResult<Project> {
        if let Some(folder_id) = project.folder_id {
            self.require_folder(folder_id)?;
        }
        project.modified_at = now;
        self.projects.update_project(&project)?;
        Ok(project)
    }

    pub fn complete_project(&self, id: ProjectId, now: i64) -> ProjectServiceResult<Project> {
        self.transition(id, |project| project.complete(now))
    }

    /// Drops a project and, when `drop_tasks`, its active tasks.
    pub fn drop_project(
        &self,
        id: ProjectId,
        drop_tasks: bool,
        now: i64,
    ) -> ProjectServiceResult<Project> {
        let mut project = self.get_project(id)?;
        project.drop_project(now);
        self.projects.save_dropped_project(&project, drop_tasks, now)?;
        info!(
            "event=project_drop module=service status=ok project_id={} drop_tasks={}",
            id, drop_tasks
        );
        Ok(project)
    }

    pub fn hold_project(&self, id: ProjectId, now: i64) -> ProjectServiceResult<Project> {
        self.transition(id, |project| project.hold(now))
    }

    pub fn activate_project(&self, id: ProjectId, now: i64) -> ProjectServiceResult<Project> {
        self.transition(id, |project| project.activate(now))
    }

    /// Moves a project into `folder_id` (or out of any folder) at `position`.
    pub fn move_project(
        &self,
        id: ProjectId,
        folder_id: Option<FolderId>,
        position: Option<i64>,
        now: i64,
    ) -> ProjectServiceResult<Project> {
        if let Some(folder_id) = folder_id {
            self.require_folder(folder_id)?;
        }
        self.transition(id, |project| {
            project.folder_id = folder_id;
            project.order = position.unwrap_or(0);
            project.modified_at = now;
        })
    }

    pub fn mark_reviewed(&self, id: ProjectId, now: i64) -> ProjectServiceResult<Project> {
        self.transition(id, |project| {
            project.last_reviewed_at = Some(now);
            project.modified_at = now;
        })
    }

    pub fn delete_project(
        &self,
        id: ProjectId,
        delete_tasks: bool,
        now: i64,
    ) -> ProjectServiceResult<()> {
        self.projects.delete_project(id, delete_tasks, now)?;
        info!(
            "event=project_delete module=service status=ok project_id={} delete_tasks={}",
            id, delete_tasks
        );
        Ok(())
    }

    fn transition(
        &self,
        id: ProjectId,
        apply: impl FnOnce(&mut Project),
    ) -> ProjectServiceResult<Project> {
        let mut project = self.get_project(id)?;
        apply(&mut project);
        self.projects.update_project(&project)?;
        Ok(project)
    }

    fn require_folder(&self, folder_id: FolderId) -> ProjectServiceResult<()> {
        match self.folders.get_folder(folder_id)? {
            Some(_) => Ok(()),
            None => Err(ProjectServiceError::FolderNotFound(folder_id)),
        }
    }
}
