use super::{Backend, BackendConnection, BackendError, ConnectParams, HandleOptions};
use crate::result::RowSet;
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use std::time::Duration;
use tracing::debug;

/// How long a statement waits on a database locked by another slot.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend over SQLite files.
///
/// `ConnectParams::database` is the database path; host, port and
/// credentials are ignored.
#[derive(Debug, Clone, Default)]
pub struct SqliteBackend {
    create_if_missing: bool,
}

impl SqliteBackend {
    pub fn new() -> Self {
        Self {
            create_if_missing: true,
        }
    }

    /// Refuse to create missing database files.
    pub fn existing_only() -> Self {
        Self {
            create_if_missing: false,
        }
    }
}

impl Backend for SqliteBackend {
    fn new_handle(&self, options: &HandleOptions) -> Box<dyn BackendConnection> {
        if options.auto_reconnect {
            debug!("sqlite sessions are file based; auto-reconnect has no effect");
        }
        Box::new(SqliteConnection {
            conn: None,
            create_if_missing: self.create_if_missing,
        })
    }
}

struct SqliteConnection {
    conn: Option<Connection>,
    create_if_missing: bool,
}

impl SqliteConnection {
    fn session(&mut self) -> Result<&mut Connection, BackendError> {
        self.conn
            .as_mut()
            .ok_or_else(|| BackendError::transport(0, "not connected"))
    }
}

fn map_error(err: rusqlite::Error) -> BackendError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            if matches!(
                failure.code,
                ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::SystemIoFailure
            ) {
                BackendError::transport(failure.extended_code, err.to_string())
            } else {
                BackendError::other(failure.extended_code, err.to_string())
            }
        }
        _ => BackendError::other(-1, err.to_string()),
    }
}

fn cell_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

impl BackendConnection for SqliteConnection {
    fn connect(&mut self, params: &ConnectParams) -> Result<(), BackendError> {
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        let conn = Connection::open_with_flags(&params.database, flags).map_err(map_error)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(map_error)?;
        self.conn = Some(conn);
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<(), BackendError> {
        self.session()?.execute_batch(sql).map_err(map_error)
    }

    fn query(&mut self, sql: &str) -> Result<RowSet, BackendError> {
        let conn = self.session()?;
        let mut stmt = conn.prepare(sql).map_err(map_error)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([]).map_err(map_error)?;
        while let Some(row) = cursor.next().map_err(map_error)? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                let value: Value = row.get(i).map_err(map_error)?;
                cells.push(cell_text(value));
            }
            rows.push(cells);
        }

        Ok(RowSet::new(columns, rows))
    }

    fn last_insert_id(&mut self) -> u64 {
        self.conn
            .as_ref()
            .map(|c| c.last_insert_rowid().max(0) as u64)
            .unwrap_or(0)
    }

    fn close(&mut self) {
        self.conn = None;
    }
}
