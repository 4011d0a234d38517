#![allow(dead_code)]

use regdb::backend::{ConnectParams, HandleOptions};
use regdb::{Backend, BackendConnection, BackendError, ConnectionPool, PoolConfig, RowSet};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Shared, inspectable state behind every handle of a [`ScriptedBackend`].
#[derive(Default)]
pub struct Script {
    /// Outcomes handed to successive `connect` calls; `Ok` once exhausted.
    pub connect_outcomes: VecDeque<Result<(), BackendError>>,
    pub handles_created: usize,
    /// Handle id of every connect attempt, in order.
    pub connect_attempts: Vec<usize>,
    pub auto_reconnect_requested: Vec<bool>,
    /// `(handle id, statement)` for every statement run.
    pub statements: Vec<(usize, String)>,
    /// Statements containing this text fail.
    pub fail_marker: Option<String>,
    pub last_insert_id: u64,
}

/// Backend double that records what it is asked to do.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    pub script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(marker: &str) -> Self {
        let backend = Self::new();
        backend.script.lock().unwrap().fail_marker = Some(marker.to_string());
        backend
    }

    pub fn push_connect_outcome(&self, outcome: Result<(), BackendError>) {
        self.script.lock().unwrap().connect_outcomes.push_back(outcome);
    }

    pub fn set_last_insert_id(&self, id: u64) {
        self.script.lock().unwrap().last_insert_id = id;
    }

    pub fn handles_created(&self) -> usize {
        self.script.lock().unwrap().handles_created
    }

    pub fn connect_attempts(&self) -> Vec<usize> {
        self.script.lock().unwrap().connect_attempts.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .statements
            .iter()
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    pub fn statements_on(&self, handle: usize) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .statements
            .iter()
            .filter(|(id, _)| *id == handle)
            .map(|(_, sql)| sql.clone())
            .collect()
    }
}

impl Backend for ScriptedBackend {
    fn new_handle(&self, options: &HandleOptions) -> Box<dyn BackendConnection> {
        let mut script = self.script.lock().unwrap();
        let id = script.handles_created;
        script.handles_created += 1;
        script.auto_reconnect_requested.push(options.auto_reconnect);
        Box::new(ScriptedConnection {
            id,
            script: Arc::clone(&self.script),
        })
    }
}

struct ScriptedConnection {
    id: usize,
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnection {
    fn run(&self, sql: &str) -> Result<(), BackendError> {
        let mut script = self.script.lock().unwrap();
        script.statements.push((self.id, sql.to_string()));
        match &script.fail_marker {
            Some(marker) if sql.contains(marker.as_str()) => {
                Err(BackendError::other(1064, format!("You have an error in your SQL syntax near '{marker}'")))
            }
            _ => Ok(()),
        }
    }
}

impl BackendConnection for ScriptedConnection {
    fn connect(&mut self, _params: &ConnectParams) -> Result<(), BackendError> {
        let mut script = self.script.lock().unwrap();
        script.connect_attempts.push(self.id);
        script.connect_outcomes.pop_front().unwrap_or(Ok(()))
    }

    fn execute(&mut self, sql: &str) -> Result<(), BackendError> {
        self.run(sql)
    }

    fn query(&mut self, sql: &str) -> Result<RowSet, BackendError> {
        self.run(sql)?;
        Ok(RowSet::new(vec!["count(*)".into()], vec![vec![Some("0".into())]]))
    }

    fn last_insert_id(&mut self) -> u64 {
        self.script.lock().unwrap().last_insert_id
    }
}

pub fn transport_error() -> BackendError {
    BackendError::transport(2003, "Can't connect to MySQL server on 'db' (111)")
}

pub fn auth_error() -> BackendError {
    BackendError::other(1045, "Access denied for user 'tango'@'localhost'")
}

pub fn fast_config(pool_size: usize) -> PoolConfig {
    PoolConfig::new("tango", "secret")
        .host("db:3306")
        .pool_size(pool_size)
        .retry_backoff(Duration::from_millis(1))
}

pub fn scripted_pool(pool_size: usize) -> (ConnectionPool, ScriptedBackend) {
    let backend = ScriptedBackend::new();
    let pool = ConnectionPool::connect(&fast_config(pool_size), &backend).unwrap();
    (pool, backend)
}

/// Spin until `cond` holds, failing the test after a few seconds.
pub fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}
