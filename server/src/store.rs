//! SQLite persistence for tasks and user credentials.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use thiserror::Error;
use todo_shared::{Task, TaskChanges};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("username already exists")]
    UsernameTaken,
    #[error("stored timestamp out of range: {0}")]
    BadTimestamp(i64),
    #[error("connection lock poisoned")]
    Poisoned,
}

#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Sort order for [`Store::list_tasks`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TaskOrder {
    #[default]
    Id,
    CreatedAsc,
    CreatedDesc,
}

impl FromStr for TaskOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "created_at" => Ok(Self::CreatedAsc),
            "-created_at" => Ok(Self::CreatedDesc),
            other => Err(format!("unknown ordering `{other}`")),
        }
    }
}

impl TaskOrder {
    fn sql(self) -> &'static str {
        match self {
            Self::Id => "ORDER BY id ASC",
            Self::CreatedAsc => "ORDER BY created_at_us ASC, id ASC",
            Self::CreatedDesc => "ORDER BY created_at_us DESC, id DESC",
        }
    }
}

#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if needed) the database at `path`. The special path
    /// `:memory:` gives a private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if path == Path::new(":memory:") {
            return Self::open_in_memory();
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              title TEXT NOT NULL,
              completed INTEGER NOT NULL DEFAULT 0,
              created_at_us INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              username TEXT NOT NULL UNIQUE,
              password_hash TEXT NOT NULL,
              created_at_us INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn list_tasks(&self, order: TaskOrder) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, title, completed, created_at_us FROM tasks {}",
            order.sql()
        ))?;
        let rows = stmt.query_map([], task_columns)?;
        rows.map(|row| row?.into_task()).collect()
    }

    pub fn create_task(&self, title: &str, completed: bool) -> Result<Task, StoreError> {
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks(title, completed, created_at_us) VALUES (?1, ?2, ?3)",
            params![title, completed, now.timestamp_micros()],
        )?;
        Ok(Task {
            id: conn.last_insert_rowid(),
            title: title.to_string(),
            completed,
            created_at: truncate_to_micros(now)?,
        })
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        let conn = self.conn()?;
        Self::get_task_locked(&conn, id)
    }

    fn get_task_locked(conn: &Connection, id: i64) -> Result<Option<Task>, StoreError> {
        conn.query_row(
            "SELECT id, title, completed, created_at_us FROM tasks WHERE id = ?1",
            params![id],
            task_columns,
        )
        .optional()?
        .map(TaskColumns::into_task)
        .transpose()
    }

    /// Applies the supplied members of `changes`; absent members keep their
    /// stored value. Returns `None` when no task has this id.
    pub fn update_task(&self, id: i64, changes: &TaskChanges) -> Result<Option<Task>, StoreError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE tasks
            SET title = COALESCE(?2, title),
                completed = COALESCE(?3, completed)
            WHERE id = ?1
            "#,
            params![id, changes.title, changes.completed],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        Self::get_task_locked(&conn, id)
    }

    /// Returns whether a row was removed.
    pub fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
        let now = Utc::now();
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO users(username, password_hash, created_at_us) VALUES (?1, ?2, ?3)",
            params![username, password_hash, now.timestamp_micros()],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::UsernameTaken);
            }
            Err(err) => return Err(err.into()),
        }
        Ok(UserRecord {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: truncate_to_micros(now)?,
        })
    }

    pub fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, username, password_hash, created_at_us FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, username, password_hash, created_at_us)| {
            Ok(UserRecord {
                id,
                username,
                password_hash,
                created_at: from_micros(created_at_us)?,
            })
        })
        .transpose()
    }

    pub fn count_users(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn()?
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }
}

struct TaskColumns {
    id: i64,
    title: String,
    completed: bool,
    created_at_us: i64,
}

impl TaskColumns {
    fn into_task(self) -> Result<Task, StoreError> {
        Ok(Task {
            id: self.id,
            title: self.title,
            completed: self.completed,
            created_at: from_micros(self.created_at_us)?,
        })
    }
}

fn task_columns(row: &Row<'_>) -> rusqlite::Result<TaskColumns> {
    Ok(TaskColumns {
        id: row.get(0)?,
        title: row.get(1)?,
        completed: row.get(2)?,
        created_at_us: row.get(3)?,
    })
}

fn from_micros(us: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(us).ok_or(StoreError::BadTimestamp(us))
}

// Rows keep microseconds, so values handed back on insert must match what a
// later read returns.
fn truncate_to_micros(ts: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
    from_micros(ts.timestamp_micros())
}
