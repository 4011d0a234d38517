// ============================================================================
// regdb Library
// ============================================================================

pub mod backend;
pub mod connection;
pub mod core;
pub mod dispatch;
pub mod escape;
pub mod history;
pub mod ior;
pub mod lock;
pub mod result;
pub mod stats;

// Re-export main types for convenience
pub use crate::core::{ConnectError, DbError, Result};
pub use backend::{Backend, BackendConnection, BackendError, BackendErrorKind, SqliteBackend};
pub use connection::{ConnectionPool, PoolConfig, PoolGuard, PoolStats};
pub use dispatch::Dispatcher;
pub use history::{HistoryFilter, Retention};
pub use ior::{IorError, host_port_from_ior};
pub use lock::TableLock;
pub use result::RowSet;
pub use stats::{TimingEntry, TimingStats};

use std::sync::Arc;
use std::time::Instant;

// ============================================================================
// Registry database facade
// ============================================================================

/// Everything the registry's RPC layer needs to reach the database.
///
/// # Examples
///
/// ```
/// use regdb::{PoolConfig, RegistryDb, SqliteBackend};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("registry.db");
/// let config = PoolConfig::new("tango", "secret")
///     .database(path.to_str().unwrap())
///     .pool_size(2);
///
/// let db = RegistryDb::connect(&config, &SqliteBackend::new())?;
/// db.dispatcher().execute("CREATE TABLE device (name TEXT)", "DbInfo", None)?;
/// let rows = db.dispatcher().query("SELECT * FROM device", "DbInfo", None)?;
/// assert!(rows.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct RegistryDb {
    dispatcher: Dispatcher,
    retention: Retention,
    stats: Arc<TimingStats>,
}

impl RegistryDb {
    /// Open the pool and wire dispatcher, retention and timing statistics.
    pub fn connect(config: &PoolConfig, backend: &dyn Backend) -> std::result::Result<Self, ConnectError> {
        let pool = ConnectionPool::connect(config, backend)?;
        Ok(Self::from_pool(Arc::new(pool), config.history_depth))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Arc<ConnectionPool>, history_depth: usize) -> Self {
        let stats = Arc::new(TimingStats::with_default_operations());
        let dispatcher = Dispatcher::new(pool);
        let retention = Retention::new(dispatcher.clone(), history_depth);
        Self {
            dispatcher,
            retention,
            stats,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn retention(&self) -> &Retention {
        &self.retention
    }

    /// Lock tables until the returned value is dropped.
    pub fn lock_tables(&self, lock_sql: &str) -> Result<TableLock<'_>> {
        TableLock::acquire(&self.dispatcher, lock_sql)
    }

    /// Run one registry operation and record its latency on success.
    ///
    /// All statements `f` issues count as a single call of `operation`.
    pub fn timed<T>(&self, operation: &str, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let started = Instant::now();
        let out = f(self)?;
        self.stats.record(operation, started.elapsed());
        Ok(out)
    }

    pub fn timing_stats(&self) -> &TimingStats {
        &self.stats
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.dispatcher.pool().stats()
    }
}
