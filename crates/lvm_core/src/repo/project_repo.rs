//! Project repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist project records and filtered project listings.
//! - Apply project-level cascades to owned tasks in one transaction.
//!
//! # Invariants
//! - `Project::validate()` runs before every insert or update.
//! - Deleting a project without `delete_tasks` moves its tasks to the inbox.
//! - Dropping tasks with a project only touches active tasks.

use crate::model::folder::FolderId;
use crate::model::project::{Project, ProjectId, ProjectStatus, ProjectType};
use crate::model::task::TaskId;
use crate::repo::{
    bool_to_int, ensure_connection_ready, parse_bool, parse_optional_uuid, parse_uuid, uuid_text,
    EntityKind, ParentFilter, RepoError, RepoResult, SIBLING_ORDER_SQL,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    title,
    note,
    status,
    type,
    flagged,
    due_date,
    defer_date,
    completed_at,
    dropped_at,
    folder_id,
    review_interval_days,
    last_reviewed_at,
    auto_complete,
    sort_order,
    created_at,
    modified_at
FROM projects";

/// Filters for listing projects. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct ProjectListQuery {
    pub status: Option<ProjectStatus>,
    pub kind: Option<ProjectType>,
    pub flagged: Option<bool>,
    pub folder: Option<ParentFilter<FolderId>>,
    pub due_before: Option<i64>,
    pub due_after: Option<i64>,
    /// Only active projects whose own defer date is at or before this instant.
    pub available_at: Option<i64>,
}

/// Repository interface for project persistence.
pub trait ProjectRepository {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId>;
    fn update_project(&self, project: &Project) -> RepoResult<()>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>>;
    /// Saves `project` and, when `drop_tasks`, drops its active tasks at `now`.
    fn save_dropped_project(&self, project: &Project, drop_tasks: bool, now: i64)
        -> RepoResult<()>;
    /// Deletes a project; its tasks are deleted or moved to the inbox.
    fn delete_project(&self, id: ProjectId, delete_tasks: bool, now: i64) -> RepoResult<()>;
    /// Inserts `project` and deletes task `task_id` atomically.
    fn create_project_from_task(&self, project: &Project, task_id: TaskId) -> RepoResult<()>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["projects", "tasks", "folders"])?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId> {
        insert_project(self.conn, project)?;
        Ok(project.id)
    }

    fn update_project(&self, project: &Project) -> RepoResult<()> {
        write_project(self.conn, project)
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_project_row(row)?));
        }
        Ok(None)
    }

    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
        let mut sql = format!("{PROJECT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(project_status_to_db(status).to_string()));
        }
        if let Some(kind) = query.kind {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(project_type_to_db(kind).to_string()));
        }
        if let Some(flagged) = query.flagged {
            sql.push_str(" AND flagged = ?");
            bind_values.push(Value::Integer(bool_to_int(flagged)));
        }
        match query.folder {
            None => {}
            Some(ParentFilter::Root) => sql.push_str(" AND folder_id IS NULL"),
            Some(ParentFilter::Under(folder_id)) => {
                sql.push_str(" AND folder_id = ?");
                bind_values.push(Value::Text(folder_id.to_string()));
            }
        }
        if let Some(due_before) = query.due_before {
            sql.push_str(" AND due_date < ?");
            bind_values.push(Value::Integer(due_before));
        }
        if let Some(due_after) = query.due_after {
            sql.push_str(" AND due_date > ?");
            bind_values.push(Value::Integer(due_after));
        }
        if let Some(now) = query.available_at {
            sql.push_str(" AND status = 'active' AND (defer_date IS NULL OR defer_date <= ?)");
            bind_values.push(Value::Integer(now));
        }

        sql.push(' ');
        sql.push_str(SIBLING_ORDER_SQL);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn save_dropped_project(
        &self,
        project: &Project,
        drop_tasks: bool,
        now: i64,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        write_project(&tx, project)?;
        if drop_tasks {
            tx.execute(
                "UPDATE tasks
                 SET status = 'dropped',
                     dropped_at = ?2,
                     completed_at = NULL,
                     modified_at = ?2
                 WHERE project_id = ?1
                   AND status = 'active';",
                params![project.id.to_string(), now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_project(&self, id: ProjectId, delete_tasks: bool, now: i64) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if delete_tasks {
            tx.execute("DELETE FROM tasks WHERE project_id = ?1;", [id.to_string()])?;
        } else {
            tx.execute(
                "UPDATE tasks
                 SET project_id = NULL,
                     modified_at = ?2
                 WHERE project_id = ?1;",
                params![id.to_string(), now],
            )?;
        }
        let changed = tx.execute("DELETE FROM projects WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Project, id));
        }
        tx.commit()?;
        Ok(())
    }

    fn create_project_from_task(&self, project: &Project, task_id: TaskId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_project(&tx, project)?;
        let changed = tx.execute("DELETE FROM tasks WHERE id = ?1;", [task_id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Task, task_id));
        }
        tx.commit()?;
        Ok(())
    }
}

fn insert_project(conn: &Connection, project: &Project) -> RepoResult<()> {
    project.validate()?;
    conn.execute(
        "INSERT INTO projects (
            id,
            title,
            note,
            status,
            type,
            flagged,
            due_date,
            defer_date,
            completed_at,
            dropped_at,
            folder_id,
            review_interval_days,
            last_reviewed_at,
            auto_complete,
            sort_order,
            created_at,
            modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
        params![
            project.id.to_string(),
            project.title.as_str(),
            project.note.as_deref(),
            project_status_to_db(project.status),
            project_type_to_db(project.kind),
            bool_to_int(project.flagged),
            project.due_date,
            project.defer_date,
            project.completed_at,
            project.dropped_at,
            uuid_text(project.folder_id),
            project.review_interval_days,
            project.last_reviewed_at,
            bool_to_int(project.auto_complete),
            project.order,
            project.created_at,
            project.modified_at,
        ],
    )?;
    Ok(())
}

fn write_project(conn: &Connection, project: &Project) -> RepoResult<()> {
    project.validate()?;
    let changed = conn.execute(
        "UPDATE projects
         SET
            title = ?2,
            note = ?3,
            status = ?4,
            type = ?5,
            flagged = ?6,
            due_date = ?7,
            defer_date = ?8,
            completed_at = ?9,
            dropped_at = ?10,
            folder_id = ?11,
            review_interval_days = ?12,
            last_reviewed_at = ?13,
            auto_complete = ?14,
            sort_order = ?15,
            modified_at = ?16
         WHERE id = ?1;",
        params![
            project.id.to_string(),
            project.title.as_str(),
            project.note.as_deref(),
            project_status_to_db(project.status),
            project_type_to_db(project.kind),
            bool_to_int(project.flagged),
            project.due_date,
            project.defer_date,
            project.completed_at,
            project.dropped_at,
            uuid_text(project.folder_id),
            project.review_interval_days,
            project.last_reviewed_at,
            bool_to_int(project.auto_complete),
            project.order,
            project.modified_at,
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::not_found(EntityKind::Project, project.id));
    }
    Ok(())
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "projects.id")?;

    let status_text: String = row.get("status")?;
    let status = parse_project_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid project status `{status_text}` in projects.status"
        ))
    })?;
    let type_text: String = row.get("type")?;
    let kind = parse_project_type(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid project type `{type_text}` in projects.type"))
    })?;

    let project = Project {
        id,
        title: row.get("title")?,
        note: row.get("note")?,
        status,
        kind,
        flagged: parse_bool(row.get("flagged")?, "projects.flagged")?,
        due_date: row.get("due_date")?,
        defer_date: row.get("defer_date")?,
        completed_at: row.get("completed_at")?,
        dropped_at: row.get("dropped_at")?,
        folder_id: parse_optional_uuid(row.get("folder_id")?, "projects.folder_id")?,
        review_interval_days: row.get("review_interval_days")?,
        last_reviewed_at: row.get("last_reviewed_at")?,
        auto_complete: parse_bool(row.get("auto_complete")?, "projects.auto_complete")?,
        order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    };
    project
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("project {id}: {err}")))?;
    Ok(project)
}

fn project_status_to_db(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Active => "active",
        ProjectStatus::OnHold => "on_hold",
        ProjectStatus::Completed => "completed",
        ProjectStatus::Dropped => "dropped",
    }
}

fn parse_project_status(value: &str) -> Option<ProjectStatus> {
    match value {
        "active" => Some(ProjectStatus::Active),
        "on_hold" => Some(ProjectStatus::OnHold),
        "completed" => Some(ProjectStatus::Completed),
        "dropped" => Some(ProjectStatus::Dropped),
        _ => None,
    }
}

fn project_type_to_db(kind: ProjectType) -> &'static str {
    match kind {
        ProjectType::Parallel => "parallel",
        ProjectType::Sequential => "sequential",
        ProjectType::SingleActions => "single_actions",
    }
}

fn parse_project_type(value: &str) -> Option<ProjectType> {
    match value {
        "parallel" => Some(ProjectType::Parallel),
        "sequential" => Some(ProjectType::Sequential),
        "single_actions" => Some(ProjectType::SingleActions),
        _ => None,
    }
}
