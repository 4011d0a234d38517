//! Per-operation timing statistics.
//!
//! One table per process, seeded with a fixed set of operation names and
//! updated under a single mutex each time a tracked operation completes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Operations tracked by default.
pub const DEFAULT_TRACKED_OPERATIONS: &[&str] = &[
    "DbImportDevice",
    "DbExportDevice",
    "DbGetHostServerList",
    "DbGetHostList",
    "DbGetServerList",
    "DbGetDevicePropertyList",
    "DbGetClassPropertyList",
    "DbGetDeviceMemberList",
    "DbGetDeviceFamilyList",
    "DbGetDeviceDomainList",
    "DbGetDeviceProperty",
    "DbPutDeviceProperty",
    "DbDeleteDeviceProperty",
    "DbInfo",
    "DbGetDeviceClassList",
    "DbGetDeviceAttributeProperty",
    "DbPutDeviceAttributeProperty",
    "DbGetDeviceAttributeProperty2",
    "DbPutDeviceAttributeProperty2",
    "DbUnExportServer",
    "DbGetDeviceExportedList",
    "DbExportEvent",
    "DbImportEvent",
    "DbGetDataForServerCache",
    "DbPutClassProperty",
    "DbMySqlSelect",
    "DbGetDevicePipeProperty",
    "DbPutDevicePipeProperty",
];

/// Latency summary for one operation, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimingEntry {
    pub name: String,
    pub calls: u64,
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl TimingEntry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn add(&mut self, millis: f64) {
        if self.calls == 0 {
            self.minimum = millis;
            self.maximum = millis;
        } else {
            self.minimum = self.minimum.min(millis);
            self.maximum = self.maximum.max(millis);
        }
        self.average = (self.average * self.calls as f64 + millis) / (self.calls + 1) as f64;
        self.calls += 1;
    }
}

#[derive(Debug)]
pub struct TimingStats {
    entries: Mutex<BTreeMap<String, TimingEntry>>,
}

impl TimingStats {
    pub fn new<I, S>(operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = operations
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                (name.to_string(), TimingEntry::new(name))
            })
            .collect();

        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn with_default_operations() -> Self {
        Self::new(DEFAULT_TRACKED_OPERATIONS.iter().copied())
    }

    fn table(&self) -> MutexGuard<'_, BTreeMap<String, TimingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add one completed call. Returns `false` if `operation` is not tracked.
    pub fn record(&self, operation: &str, elapsed: Duration) -> bool {
        match self.table().get_mut(operation) {
            Some(entry) => {
                entry.add(elapsed.as_secs_f64() * 1000.0);
                true
            }
            None => false,
        }
    }

    /// Run `f` and record its duration under `operation`.
    pub fn time<R>(&self, operation: &str, f: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let out = f();
        self.record(operation, started.elapsed());
        out
    }

    pub fn is_tracked(&self, operation: &str) -> bool {
        self.table().contains_key(operation)
    }

    pub fn entry(&self, operation: &str) -> Option<TimingEntry> {
        self.table().get(operation).cloned()
    }

    /// All entries, ordered by operation name.
    pub fn snapshot(&self) -> Vec<TimingEntry> {
        self.table().values().cloned().collect()
    }

    /// Zero every entry, keeping the set of tracked names.
    pub fn reset(&self) {
        for entry in self.table().values_mut() {
            *entry = TimingEntry::new(&entry.name);
        }
    }
}

impl Default for TimingStats {
    fn default() -> Self {
        Self::with_default_operations()
    }
}
