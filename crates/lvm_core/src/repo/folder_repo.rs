//! Folder repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Dropped folders are hidden from listings unless asked for by status or
//!   `include_dropped`.
//! - A non-recursive delete re-parents direct children to the deleted
//!   folder's parent before the row is removed.

use crate::model::folder::{Folder, FolderId, FolderStatus};
use crate::repo::{
    ensure_connection_ready, parse_optional_uuid, parse_uuid, uuid_text, EntityKind, ParentFilter,
    RepoError, RepoResult, NAMED_ORDER_SQL,
};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use serde::Serialize;

const FOLDER_SELECT_SQL: &str = "SELECT
    id,
    name,
    status,
    parent_id,
    sort_order,
    created_at,
    modified_at
FROM folders";

/// Counts for one folder. Totals cover the folder and every subfolder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FolderStats {
    /// Direct subfolders.
    pub folder_count: u32,
    /// Projects filed directly in the folder.
    pub project_count: u32,
    pub total_projects: u32,
    pub total_tasks: u32,
    /// Active tasks among `total_tasks`.
    pub remaining_tasks: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FolderListQuery {
    pub status: Option<FolderStatus>,
    pub include_dropped: bool,
    pub parent: Option<ParentFilter<FolderId>>,
}

/// Repository interface for folder persistence.
pub trait FolderRepository {
    fn create_folder(&self, folder: &Folder) -> RepoResult<FolderId>;
    fn update_folder(&self, folder: &Folder) -> RepoResult<()>;
    fn get_folder(&self, id: FolderId) -> RepoResult<Option<Folder>>;
    fn list_folders(&self, query: &FolderListQuery) -> RepoResult<Vec<Folder>>;
    /// Deletes a folder. Subfolders are removed with it when `recursive`,
    /// otherwise they move up one level.
    fn delete_folder(&self, id: FolderId, recursive: bool, now: i64) -> RepoResult<()>;
    fn parent_links(&self) -> RepoResult<Vec<(FolderId, Option<FolderId>)>>;
    fn folder_stats(&self, id: FolderId) -> RepoResult<FolderStats>;
}

/// SQLite-backed folder repository.
pub struct SqliteFolderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFolderRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["folders", "projects", "tasks"])?;
        Ok(Self { conn })
    }
}

impl FolderRepository for SqliteFolderRepository<'_> {
    fn create_folder(&self, folder: &Folder) -> RepoResult<FolderId> {
        folder.validate()?;
        self.conn.execute(
            "INSERT INTO folders (
                id,
                name,
                status,
                parent_id,
                sort_order,
                created_at,
                modified_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                folder.id.to_string(),
                folder.name.as_str(),
                folder_status_to_db(folder.status),
                uuid_text(folder.parent_id),
                folder.order,
                folder.created_at,
                folder.modified_at,
            ],
        )?;
        Ok(folder.id)
    }

    fn update_folder(&self, folder: &Folder) -> RepoResult<()> {
        folder.validate()?;
        let changed = self.conn.execute(
            "UPDATE folders
             SET
                name = ?2,
                status = ?3,
                parent_id = ?4,
                sort_order = ?5,
                modified_at = ?6
             WHERE id = ?1;",
            params![
                folder.id.to_string(),
                folder.name.as_str(),
                folder_status_to_db(folder.status),
                uuid_text(folder.parent_id),
                folder.order,
                folder.modified_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Folder, folder.id));
        }
        Ok(())
    }

    fn get_folder(&self, id: FolderId) -> RepoResult<Option<Folder>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FOLDER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_folder_row(row)?));
        }
        Ok(None)
    }

    fn list_folders(&self, query: &FolderListQuery) -> RepoResult<Vec<Folder>> {
        let mut sql = format!("{FOLDER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        match query.status {
            Some(status) => {
                sql.push_str(" AND status = ?");
                bind_values.push(Value::Text(folder_status_to_db(status).to_string()));
            }
            None if !query.include_dropped => sql.push_str(" AND status <> 'dropped'"),
            None => {}
        }
        match query.parent {
            None => {}
            Some(ParentFilter::Root) => sql.push_str(" AND parent_id IS NULL"),
            Some(ParentFilter::Under(parent_id)) => {
                sql.push_str(" AND parent_id = ?");
                bind_values.push(Value::Text(parent_id.to_string()));
            }
        }
        sql.push(' ');
        sql.push_str(NAMED_ORDER_SQL);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut folders = Vec::new();
        while let Some(row) = rows.next()? {
            folders.push(parse_folder_row(row)?);
        }
        Ok(folders)
    }

    fn delete_folder(&self, id: FolderId, recursive: bool, now: i64) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let parent: Option<Option<String>> = tx
            .query_row(
                "SELECT parent_id FROM folders WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(parent) = parent else {
            return Err(RepoError::not_found(EntityKind::Folder, id));
        };

        if !recursive {
            tx.execute(
                "UPDATE folders
                 SET parent_id = ?2,
                     modified_at = ?3
                 WHERE parent_id = ?1;",
                params![id.to_string(), parent, now],
            )?;
        }
        tx.execute("DELETE FROM folders WHERE id = ?1;", [id.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    fn parent_links(&self) -> RepoResult<Vec<(FolderId, Option<FolderId>)>> {
        let mut stmt = self.conn.prepare("SELECT id, parent_id FROM folders;")?;
        let mut rows = stmt.query([])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            links.push((
                parse_uuid(&id, "folders.id")?,
                parse_optional_uuid(row.get(1)?, "folders.parent_id")?,
            ));
        }
        Ok(links)
    }

    fn folder_stats(&self, id: FolderId) -> RepoResult<FolderStats> {
        let counts = self.conn.query_row(
            "WITH RECURSIVE subtree(id) AS (
                SELECT ?1
                UNION
                SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
            ),
            filed AS (
                SELECT id FROM projects WHERE folder_id IN (SELECT id FROM subtree)
            )
            SELECT
                (SELECT COUNT(*) FROM folders WHERE parent_id = ?1),
                (SELECT COUNT(*) FROM projects WHERE folder_id = ?1),
                (SELECT COUNT(*) FROM filed),
                (SELECT COUNT(*) FROM tasks WHERE project_id IN (SELECT id FROM filed)),
                (SELECT COUNT(*) FROM tasks
                    WHERE status = 'active' AND project_id IN (SELECT id FROM filed));",
            [id.to_string()],
            |row| {
                Ok(FolderStats {
                    folder_count: row.get(0)?,
                    project_count: row.get(1)?,
                    total_projects: row.get(2)?,
                    total_tasks: row.get(3)?,
                    remaining_tasks: row.get(4)?,
                })
            },
        )?;
        Ok(counts)
    }
}

fn parse_folder_row(row: &Row<'_>) -> RepoResult<Folder> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "folders.id")?;
    let status_text: String = row.get("status")?;
    let status = match status_text.as_str() {
        "active" => FolderStatus::Active,
        "dropped" => FolderStatus::Dropped,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid folder status `{other}` in folders.status"
            )))
        }
    };

    let folder = Folder {
        id,
        name: row.get("name")?,
        status,
        parent_id: parse_optional_uuid(row.get("parent_id")?, "folders.parent_id")?,
        order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    };
    folder
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("folder {id}: {err}")))?;
    Ok(folder)
}

fn folder_status_to_db(status: FolderStatus) -> &'static str {
    match status {
        FolderStatus::Active => "active",
        FolderStatus::Dropped => "dropped",
    }
}
