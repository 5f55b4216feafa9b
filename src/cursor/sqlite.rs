use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::cursor::Cursor;
use crate::error::CursorError;

/// Create the cursor table if it does not exist yet
fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cursors (
            network TEXT PRIMARY KEY,
            height INTEGER NOT NULL CHECK (height >= 0),
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;
    Ok(())
}

fn to_sql_height(height: u64) -> Result<i64, CursorError> {
    i64::try_from(height).map_err(|_| CursorError::Overflow(height))
}

fn from_sql_height(height: i64) -> Result<u64, CursorError> {
    u64::try_from(height).map_err(|_| CursorError::Invalid(format!("negative height {}", height)))
}

/// Cursor persisted in SQLite, one row per key (usually the network name)
pub struct SqliteCursor {
    conn: Mutex<Connection>,
    key: String,
}

impl SqliteCursor {
    /// Open or create the cursor for `key`.
    ///
    /// `start` seeds a new row and is ignored when the row already exists.
    pub fn open<P: AsRef<Path>>(path: P, key: &str, start: u64) -> Result<Self, CursorError> {
        Self::with_connection(Connection::open(path)?, key, start)
    }

    pub fn open_in_memory(key: &str, start: u64) -> Result<Self, CursorError> {
        Self::with_connection(Connection::open_in_memory()?, key, start)
    }

    fn with_connection(conn: Connection, key: &str, start: u64) -> Result<Self, CursorError> {
        initialize_schema(&conn)?;
        conn.execute(
            "INSERT OR IGNORE INTO cursors (network, height) VALUES (?1, ?2)",
            params![key, to_sql_height(start)?],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            key: key.to_string(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Move the cursor to an explicit height, e.g. to rewind after an operator decision
    pub fn reset_to(&self, height: u64) -> Result<(), CursorError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE cursors SET height = ?1, updated_at = strftime('%s', 'now') WHERE network = ?2",
            params![to_sql_height(height)?, self.key],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CursorError> {
        self.conn
            .lock()
            .map_err(|_| CursorError::Lock("cursor connection poisoned".to_string()))
    }

    fn read(conn: &Connection, key: &str) -> Result<u64, CursorError> {
        let height: Option<i64> = conn
            .query_row("SELECT height FROM cursors WHERE network = ?1", params![key], |row| row.get(0))
            .optional()?;

        match height {
            Some(height) => from_sql_height(height),
            None => Err(CursorError::Invalid(format!("no cursor row for {}", key))),
        }
    }
}

impl Cursor for SqliteCursor {
    fn position(&self) -> Result<u64, CursorError> {
        let conn = self.lock()?;
        Self::read(&conn, &self.key)
    }

    fn advance(&self) -> Result<(), CursorError> {
        let conn = self.lock()?;
        let current = Self::read(&conn, &self.key)?;
        let next = current.checked_add(1).ok_or(CursorError::Overflow(current))?;

        conn.execute(
            "UPDATE cursors SET height = ?1, updated_at = strftime('%s', 'now') WHERE network = ?2",
            params![to_sql_height(next)?, self.key],
        )?;
        Ok(())
    }
}
