//! SQL backend collaborator.
//!
//! The pool never talks to a database directly: it asks a [`Backend`] for
//! fresh handles and drives them through [`BackendConnection`]. Handle
//! creation and session establishment are separate steps so a handle left
//! in a bad state by a transport failure can be thrown away and rebuilt.

pub mod sqlite;

use crate::result::RowSet;
use std::fmt;

pub use sqlite::SqliteBackend;

/// Classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The server could not be reached or the link dropped.
    Transport,
    /// Anything else: syntax, permissions, constraint violations...
    Other,
}

/// Error reported by a backend, carrying the native error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub code: i32,
    pub message: String,
}

impl BackendError {
    pub fn transport(code: i32, message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Transport,
            code,
            message: message.into(),
        }
    }

    pub fn other(code: i32, message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Other,
            code,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind == BackendErrorKind::Transport
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for BackendError {}

/// Options applied when a handle is created, before connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleOptions {
    /// Let the transport transparently reconnect after timeouts or restarts.
    pub auto_reconnect: bool,
}

/// Session parameters for [`BackendConnection::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Factory for backend handles.
pub trait Backend: Send + Sync {
    fn new_handle(&self, options: &HandleOptions) -> Box<dyn BackendConnection>;
}

/// One backend session.
pub trait BackendConnection: Send {
    fn connect(&mut self, params: &ConnectParams) -> Result<(), BackendError>;

    /// Run a statement, discarding any result.
    fn execute(&mut self, sql: &str) -> Result<(), BackendError>;

    /// Run a statement and buffer its whole result.
    fn query(&mut self, sql: &str) -> Result<RowSet, BackendError>;

    /// Id generated by the last insert/update on this session, 0 if none.
    fn last_insert_id(&mut self) -> u64;

    fn close(&mut self) {}
}
