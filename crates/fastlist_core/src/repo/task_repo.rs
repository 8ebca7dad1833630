//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the durable record operations the task store builds on.
//! - Keep SQL details and ordering behavior inside the repository boundary.
//!
//! # Invariants
//! - Listing is deterministic: `sort_order ASC, created_at ASC, task_uuid ASC`.
//! - Every structural write rewrites `sort_order` for the full stored set in
//!   the same transaction as the row change.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::task::{Task, TaskId, TaskValidationError};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_COLUMNS: [&str; 6] = [
    "task_uuid",
    "title",
    "is_done",
    "sort_order",
    "created_at",
    "updated_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Record failed validation before write or after read.
    Validation(TaskValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// No stored row has this id.
    NotFound(TaskId),
    /// An order rewrite did not cover exactly the stored set.
    StaleOrder { listed: usize, stored: usize },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::StaleOrder { listed, stored } => write!(
                f,
                "order rewrite lists {listed} tasks but {stored} are stored"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "task repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "task repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "task repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
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

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
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

/// Durable record store the task store writes through.
///
/// `ordered_ids` arguments always describe the complete sequence after the
/// change, index = new `sort_order`.
pub trait TaskRepository {
    /// Loads every stored task in persisted order.
    fn list_ordered(&self) -> RepoResult<Vec<Task>>;
    /// Inserts one task and rewrites the order of the full set.
    fn insert_task(&self, task: &Task, ordered_ids: &[TaskId]) -> RepoResult<()>;
    /// Persists the done flag of one task.
    fn update_done(&self, id: TaskId, done: bool) -> RepoResult<()>;
    /// Persists the done flag of one task and rewrites the order of the full set.
    fn update_done_with_order(
        &self,
        id: TaskId,
        done: bool,
        ordered_ids: &[TaskId],
    ) -> RepoResult<()>;
    /// Rewrites the order of the full set.
    fn write_order(&self, ordered_ids: &[TaskId]) -> RepoResult<()>;
    /// Deletes one task and rewrites the order of the remaining set.
    fn delete_task(&self, id: TaskId, remaining_ids: &[TaskId]) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_task_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn begin(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn list_ordered(&self) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT task_uuid, title, is_done, sort_order
             FROM tasks
             ORDER BY sort_order ASC, created_at ASC, task_uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn insert_task(&self, task: &Task, ordered_ids: &[TaskId]) -> RepoResult<()> {
        task.validate()?;

        let tx = self.begin()?;
        tx.execute(
            "INSERT INTO tasks (task_uuid, title, is_done, sort_order)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                task.id.to_string(),
                task.title.as_str(),
                bool_to_int(task.done),
                i64::from(task.order),
            ],
        )?;
        rewrite_order(&tx, ordered_ids)?;
        tx.commit()?;
        Ok(())
    }

    fn update_done(&self, id: TaskId, done: bool) -> RepoResult<()> {
        write_done(self.conn, id, done)
    }

    fn update_done_with_order(
        &self,
        id: TaskId,
        done: bool,
        ordered_ids: &[TaskId],
    ) -> RepoResult<()> {
        let tx = self.begin()?;
        write_done(&tx, id, done)?;
        rewrite_order(&tx, ordered_ids)?;
        tx.commit()?;
        Ok(())
    }

    fn write_order(&self, ordered_ids: &[TaskId]) -> RepoResult<()> {
        let tx = self.begin()?;
        rewrite_order(&tx, ordered_ids)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_task(&self, id: TaskId, remaining_ids: &[TaskId]) -> RepoResult<()> {
        let tx = self.begin()?;
        let changed = tx.execute("DELETE FROM tasks WHERE task_uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        rewrite_order(&tx, remaining_ids)?;
        tx.commit()?;
        Ok(())
    }
}

fn write_done(conn: &Connection, id: TaskId, done: bool) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE tasks
         SET is_done = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE task_uuid = ?1;",
        params![id.to_string(), bool_to_int(done)],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(id));
    }
    Ok(())
}

/// Assigns `sort_order = index` for every id; the list must match the stored set.
fn rewrite_order(conn: &Connection, ordered_ids: &[TaskId]) -> RepoResult<()> {
    let stored: i64 = conn.query_row("SELECT COUNT(*) FROM tasks;", [], |row| row.get(0))?;
    let stored = usize::try_from(stored)
        .map_err(|_| RepoError::InvalidData(format!("negative task count `{stored}`")))?;
    if stored != ordered_ids.len() {
        return Err(RepoError::StaleOrder {
            listed: ordered_ids.len(),
            stored,
        });
    }

    let mut stmt = conn.prepare(
        "UPDATE tasks
         SET sort_order = ?2,
             updated_at = CASE
                 WHEN sort_order = ?2 THEN updated_at
                 ELSE (strftime('%s', 'now') * 1000)
             END
         WHERE task_uuid = ?1;",
    )?;
    for (index, id) in ordered_ids.iter().enumerate() {
        let changed = stmt.execute(params![id.to_string(), index as i64])?;
        if changed == 0 {
            return Err(RepoError::NotFound(*id));
        }
    }
    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("task_uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid `{uuid_text}` in tasks.task_uuid"))
    })?;

    let done = match row.get::<_, i64>("is_done")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_done value `{other}` in tasks.is_done"
            )));
        }
    };

    let raw_order: i64 = row.get("sort_order")?;
    let order = u32::try_from(raw_order).map_err(|_| {
        RepoError::InvalidData(format!("invalid sort_order `{raw_order}` in tasks.sort_order"))
    })?;

    let task = Task {
        id,
        title: row.get("title")?,
        done,
        order,
    };
    task.validate()?;
    Ok(task)
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn ensure_task_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "tasks")? {
        return Err(RepoError::MissingRequiredTable("tasks"));
    }

    for column in TASK_COLUMNS {
        if !table_has_column(conn, "tasks", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "tasks",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
