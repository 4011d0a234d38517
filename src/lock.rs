use crate::connection::PoolGuard;
use crate::core::Result;
use crate::dispatch::Dispatcher;
use tracing::warn;

/// Statement releasing every table lock held by a session.
pub const UNLOCK_TABLES: &str = "UNLOCK TABLES";

/// Table locks held on one pooled connection for the lifetime of a scope.
///
/// The lock statement runs on a dedicated lease. Dropping the value unlocks
/// and returns the connection, whatever path leaves the scope.
///
/// ```ignore
/// let mut lock = TableLock::acquire(&dispatcher, "LOCK TABLES device WRITE")?;
/// dispatcher.execute("UPDATE device SET exported=0", "DbUnExportServer", Some(lock.lease()))?;
/// lock.release()?;
/// ```
pub struct TableLock<'a> {
    dispatcher: &'a Dispatcher,
    guard: PoolGuard<'a>,
    unlock_sql: String,
    unlocked: bool,
}

impl<'a> TableLock<'a> {
    pub fn acquire(dispatcher: &'a Dispatcher, lock_sql: &str) -> Result<Self> {
        Self::acquire_with(dispatcher, lock_sql, UNLOCK_TABLES)
    }

    /// Like [`acquire`](Self::acquire) with a custom unlock statement.
    pub fn acquire_with(dispatcher: &'a Dispatcher, lock_sql: &str, unlock_sql: &str) -> Result<Self> {
        let mut guard = dispatcher.pool().acquire();
        // On error the guard drops here and the slot goes back to the pool.
        dispatcher.execute(lock_sql, "TableLock", Some(&mut guard))?;

        Ok(Self {
            dispatcher,
            guard,
            unlock_sql: unlock_sql.to_string(),
            unlocked: false,
        })
    }

    /// The locked connection, for statements that must run under the lock.
    pub fn lease(&mut self) -> &mut PoolGuard<'a> {
        &mut self.guard
    }

    /// Unlock now and report the outcome; the slot is released either way.
    pub fn release(mut self) -> Result<()> {
        self.unlock()
    }

    fn unlock(&mut self) -> Result<()> {
        self.unlocked = true;
        self.dispatcher
            .execute(&self.unlock_sql, "~TableLock", Some(&mut self.guard))
    }
}

impl Drop for TableLock<'_> {
    fn drop(&mut self) {
        if !self.unlocked {
            if let Err(err) = self.unlock() {
                warn!(slot = self.guard.index(), error = %err, "failed to unlock tables");
            }
        }
    }
}
