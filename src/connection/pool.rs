use super::config::PoolConfig;
use super::gate::Gate;
use crate::backend::{Backend, BackendConnection, BackendError, ConnectParams, HandleOptions};
use crate::core::ConnectError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection pool
///
/// A fixed set of persistent backend sessions. Each slot is handed to one
/// borrower at a time; when every slot is busy, blocked callers are spread
/// over the slots in strict rotation so a burst of requests cannot pile up
/// behind a single connection.
pub struct ConnectionPool {
    slots: Vec<Slot>,
    /// Next slot a blocked caller waits on
    cursor: Mutex<usize>,
    /// Callers currently blocked on a gate
    waiting: AtomicUsize,
}

struct Slot {
    handle: Mutex<Box<dyn BackendConnection>>,
    gate: Gate,
}

impl ConnectionPool {
    /// Open every slot of the pool.
    ///
    /// The first connection is retried while the backend may still be
    /// booting; any other failure aborts the whole pool.
    pub fn connect(config: &PoolConfig, backend: &dyn Backend) -> Result<Self, ConnectError> {
        config.validate().map_err(ConnectError::InvalidConfig)?;

        let (host, port) = config.host_and_port();
        let params = ConnectParams {
            host,
            port,
            user: config.username.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
        };
        let options = HandleOptions {
            auto_reconnect: config.auto_reconnect,
        };

        info!(
            url = %config.to_url(),
            pool_size = config.pool_size,
            "opening database connection pool"
        );

        let mut handles = Vec::with_capacity(config.pool_size);
        for slot in 0..config.pool_size {
            let handle = if slot == 0 {
                connect_with_retry(backend, &options, &params, config)?
            } else {
                connect_once(backend, &options, &params, slot)?
            };
            handles.push(handle);
        }

        Ok(Self::from_handles(handles))
    }

    /// Build a pool over already connected handles.
    ///
    /// # Panics
    ///
    /// Panics if `handles` is empty.
    pub fn from_handles(handles: Vec<Box<dyn BackendConnection>>) -> Self {
        assert!(!handles.is_empty(), "a connection pool needs at least one slot");

        let slots = handles
            .into_iter()
            .map(|handle| Slot {
                handle: Mutex::new(handle),
                gate: Gate::new(),
            })
            .collect();

        Self {
            slots,
            cursor: Mutex::new(0),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Borrow a connection, blocking until one is free.
    ///
    /// The lowest free slot is taken immediately. When all slots are busy the
    /// caller is assigned the next slot in rotation and waits on that slot
    /// only, even if another one frees first.
    pub fn acquire(&self) -> PoolGuard<'_> {
        if let Some(guard) = self.try_acquire() {
            return guard;
        }

        let index = self.next_wait_slot();
        warn!(slot = index, "waiting for one free database connection");

        self.waiting.fetch_add(1, Ordering::SeqCst);
        self.slots[index].gate.enter();
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        PoolGuard { pool: self, index }
    }

    /// Like [`acquire`](Self::acquire), but gives up after `timeout`.
    ///
    /// The wait is still bound to the round-robin slot; `None` means that
    /// slot stayed busy for the whole period.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<PoolGuard<'_>> {
        if let Some(guard) = self.try_acquire() {
            return Some(guard);
        }

        let index = self.next_wait_slot();
        warn!(slot = index, ?timeout, "waiting for one free database connection");

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let entered = self.slots[index].gate.enter_timeout(timeout);
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        entered.then_some(PoolGuard { pool: self, index })
    }

    /// Borrow the lowest free slot, if any, without waiting.
    pub fn try_acquire(&self) -> Option<PoolGuard<'_>> {
        self.slots
            .iter()
            .position(|slot| slot.gate.try_enter())
            .map(|index| {
                debug!(slot = index, "borrowed database connection");
                PoolGuard { pool: self, index }
            })
    }

    fn next_wait_slot(&self) -> usize {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let index = *cursor;
        *cursor = (index + 1) % self.slots.len();
        index
    }

    fn release(&self, index: usize) {
        debug!(slot = index, "released database connection");
        self.slots[index].gate.leave();
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.slots.len(),
            busy: self.slots.iter().filter(|slot| slot.gate.is_taken()).count(),
            waiting: self.waiting.load(Ordering::SeqCst),
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        for slot in &self.slots {
            slot.handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .close();
        }
    }
}

fn connect_once(
    backend: &dyn Backend,
    options: &HandleOptions,
    params: &ConnectParams,
    slot: usize,
) -> Result<Box<dyn BackendConnection>, ConnectError> {
    warn!(slot, "going to connect to database");
    let mut handle = backend.new_handle(options);
    match handle.connect(params) {
        Ok(()) => Ok(handle),
        Err(err) => {
            warn!(slot, error = %err, "failed to connect to database, no retry for this connection");
            Err(cannot_connect(slot, 1, &err))
        }
    }
}

fn connect_with_retry(
    backend: &dyn Backend,
    options: &HandleOptions,
    params: &ConnectParams,
    config: &PoolConfig,
) -> Result<Box<dyn BackendConnection>, ConnectError> {
    warn!(slot = 0, "going to connect to database");
    let mut handle = backend.new_handle(options);
    let mut last_error = match handle.connect(params) {
        Ok(()) => return Ok(handle),
        Err(err) => err,
    };

    for retry in 1..=config.connect_retries {
        std::thread::sleep(config.retry_backoff);
        warn!(slot = 0, code = last_error.code, "connection to database failed");

        // A handle that saw the link drop is not reused.
        if last_error.is_transport() {
            handle.close();
            handle = backend.new_handle(options);
        }

        warn!(slot = 0, retry, "going to retry to connect to database");
        match handle.connect(params) {
            Ok(()) => {
                warn!(slot = 0, retry, "database connection succeeded after retry");
                return Ok(handle);
            }
            Err(err) => {
                warn!(slot = 0, retry, error = %err, "connection to database (re-try) failed");
                last_error = err;
            }
        }
    }

    warn!(
        retries = config.connect_retries,
        "no database connection possible after all retries"
    );
    Err(cannot_connect(0, config.connect_retries + 1, &last_error))
}

fn cannot_connect(slot: usize, attempts: u32, err: &BackendError) -> ConnectError {
    ConnectError::CannotConnect {
        slot,
        attempts,
        message: err.message.clone(),
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub busy: usize,
    pub waiting: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} busy, {} waiting",
            self.busy, self.size, self.waiting
        )
    }
}

/// RAII lease on one pool slot
///
/// Returns the slot to the pool when dropped.
pub struct PoolGuard<'a> {
    pool: &'a ConnectionPool,
    index: usize,
}

impl<'a> PoolGuard<'a> {
    /// Index of the leased slot
    pub fn index(&self) -> usize {
        self.index
    }

    /// Pool the slot belongs to
    pub fn pool(&self) -> &'a ConnectionPool {
        self.pool
    }

    /// Run `f` against the leased backend session.
    pub fn with_connection<R>(&mut self, f: impl FnOnce(&mut dyn BackendConnection) -> R) -> R {
        let mut handle = self.pool.slots[self.index]
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut **handle)
    }
}

impl Drop for PoolGuard<'_> {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}
