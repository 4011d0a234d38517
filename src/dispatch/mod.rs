use crate::backend::BackendError;
use crate::connection::{ConnectionPool, PoolGuard};
use crate::core::{DbError, Result};
use crate::escape::is_sql_identifier;
use crate::result::RowSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs statements on pooled connections.
///
/// Every entry point takes an optional lease. Without one, a connection is
/// borrowed for the single call and returned on every exit path; with one,
/// the caller keeps the lease and the statement runs on that connection.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<ConnectionPool>,
}

impl Dispatcher {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Run `f` on the caller's lease, or on one borrowed for the call.
    pub fn with_lease<R>(
        &self,
        lease: Option<&mut PoolGuard<'_>>,
        f: impl FnOnce(&mut PoolGuard<'_>) -> R,
    ) -> R {
        match lease {
            Some(guard) => f(guard),
            None => {
                let mut guard = self.pool.acquire();
                f(&mut guard)
            }
        }
    }

    /// Execute a statement, ignoring any result.
    pub fn execute(
        &self,
        sql: &str,
        operation: &str,
        lease: Option<&mut PoolGuard<'_>>,
    ) -> Result<()> {
        self.with_lease(lease, |guard| {
            debug!(slot = guard.index(), operation, statement = sql, "executing statement");
            guard.with_connection(|conn| conn.execute(sql))
        })
        .map_err(|err| query_failed(operation, sql, err))
    }

    /// Execute a statement and buffer its result.
    pub fn query(
        &self,
        sql: &str,
        operation: &str,
        lease: Option<&mut PoolGuard<'_>>,
    ) -> Result<RowSet> {
        self.with_lease(lease, |guard| {
            debug!(slot = guard.index(), operation, statement = sql, "running query");
            guard.with_connection(|conn| conn.query(sql))
        })
        .map_err(|err| query_failed(operation, sql, err))
    }

    /// Allocate the next id of a history sequence.
    ///
    /// The increment and the read of the generated id must see the same
    /// session, so both run on one lease.
    pub fn next_history_id(&self, name: &str, lease: Option<&mut PoolGuard<'_>>) -> Result<u64> {
        const OPERATION: &str = "get_id()";

        if !is_sql_identifier(name) {
            return Err(DbError::InvalidIdentifier {
                operation: OPERATION.to_string(),
                identifier: name.to_string(),
            });
        }

        let sql = format!("UPDATE {name}_history_id SET id=LAST_INSERT_ID(id+1)");
        self.with_lease(lease, |guard| {
            self.execute(&sql, OPERATION, Some(&mut *guard))?;
            match guard.with_connection(|conn| conn.last_insert_id()) {
                0 => Err(DbError::HistoryId {
                    operation: OPERATION.to_string(),
                    name: name.to_string(),
                }),
                id => Ok(id),
            }
        })
    }

    /// Fail early if the history tables are missing.
    pub fn check_history_tables(&self) -> Result<()> {
        self.query(
            "SELECT count(*) FROM property_device_hist",
            "check_history_tables()",
            None,
        )
        .map(|_| ())
    }
}

fn query_failed(operation: &str, sql: &str, err: BackendError) -> DbError {
    warn!(
        operation,
        statement = sql,
        error = %err.message,
        "failed to query database"
    );
    DbError::QueryFailed {
        operation: operation.to_string(),
        statement: sql.to_string(),
        message: err.message,
    }
}
