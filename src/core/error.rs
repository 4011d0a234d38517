use thiserror::Error;

/// Failures surfaced by the query layer.
///
/// Every variant carries the operation it originated from so the RPC layer
/// can translate it into its own fault representation.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to query database (error={message})\nThe query was: {statement}")]
    QueryFailed {
        operation: String,
        statement: String,
        message: String,
    },

    #[error("Failed to get history id : {name}")]
    HistoryId { operation: String, name: String },

    #[error("Invalid SQL identifier '{identifier}'")]
    InvalidIdentifier {
        operation: String,
        identifier: String,
    },
}

impl DbError {
    /// Name of the operation that raised the error.
    pub fn operation(&self) -> &str {
        match self {
            DbError::QueryFailed { operation, .. }
            | DbError::HistoryId { operation, .. }
            | DbError::InvalidIdentifier { operation, .. } => operation,
        }
    }

    /// Stable short code for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::QueryFailed { .. } | DbError::HistoryId { .. } => "DB_SQLError",
            DbError::InvalidIdentifier { .. } => "DB_IncorrectArguments",
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Fatal failures while establishing the connection pool.
///
/// Kept apart from [`DbError`]: a pool that cannot be built aborts startup.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Failed to connect to database (error = {message})")]
    CannotConnect {
        slot: usize,
        attempts: u32,
        message: String,
    },

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
}

impl ConnectError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectError::CannotConnect { .. } => "CANNOT_CONNECT_MYSQL",
            ConnectError::InvalidConfig(_) => "DB_IncorrectArguments",
        }
    }
}
