//! Retention of property history tables.
//!
//! Every property change is appended to a history table. A purge keeps the
//! `depth` most recent rows of one property and deletes the rest, oldest
//! first, one statement per row.

use crate::connection::PoolGuard;
use crate::core::{DbError, Result};
use crate::dispatch::Dispatcher;
use crate::escape::{escape_string, is_sql_identifier};
use tracing::{debug, warn};

/// Which history rows belong to one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFilter<'a> {
    /// Device or class property: owner and property name only.
    Entity,
    /// Attribute property: also matches the attribute name.
    Attribute(&'a str),
    /// Pipe property: also matches the pipe name.
    Pipe(&'a str),
}

impl HistoryFilter<'_> {
    fn operation(&self) -> &'static str {
        match self {
            HistoryFilter::Entity => "purge_property()",
            HistoryFilter::Attribute(_) => "purge_att_property()",
            HistoryFilter::Pipe(_) => "purge_pipe_property()",
        }
    }

    fn predicate(&self) -> String {
        match self {
            HistoryFilter::Entity => String::new(),
            HistoryFilter::Attribute(attribute) => {
                format!(" AND attribute='{}'", escape_string(attribute))
            }
            HistoryFilter::Pipe(pipe) => format!(" AND pipe='{}'", escape_string(pipe)),
        }
    }
}

#[derive(Clone)]
pub struct Retention {
    dispatcher: Dispatcher,
    depth: usize,
}

impl Retention {
    pub fn new(dispatcher: Dispatcher, depth: usize) -> Self {
        Self { dispatcher, depth }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Trim one property's history down to the configured depth.
    ///
    /// `table` and `key_field` are spliced into the statement and must be
    /// plain identifiers. Returns how many rows were deleted.
    pub fn purge(
        &self,
        table: &str,
        key_field: &str,
        key_value: &str,
        name: &str,
        filter: HistoryFilter<'_>,
        lease: Option<&mut PoolGuard<'_>>,
    ) -> Result<usize> {
        let operation = filter.operation();
        for identifier in [table, key_field] {
            if !is_sql_identifier(identifier) {
                return Err(DbError::InvalidIdentifier {
                    operation: operation.to_string(),
                    identifier: identifier.to_string(),
                });
            }
        }

        let select = format!(
            "SELECT DISTINCT id,date FROM {table} WHERE {key_field}='{}' AND name='{}'{} ORDER BY date",
            escape_string(key_value),
            escape_string(name),
            filter.predicate()
        );

        self.dispatcher.with_lease(lease, |guard| {
            let rows = self.dispatcher.query(&select, operation, Some(&mut *guard))?;
            let excess = rows.row_count().saturating_sub(self.depth);
            if excess == 0 {
                return Ok(0);
            }

            debug!(table, key = key_value, name, excess, "purging history rows");
            let mut deleted = 0;
            for row in 0..excess {
                let Some(id) = rows.get(row, 0) else {
                    warn!(table, row, "history row without id left in place");
                    continue;
                };
                let delete = format!("DELETE FROM {table} WHERE id='{}'", escape_string(id));
                self.dispatcher.execute(&delete, operation, Some(&mut *guard))?;
                deleted += 1;
            }
            Ok(deleted)
        })
    }

    /// Purge a device or class property history.
    pub fn purge_property(
        &self,
        table: &str,
        field: &str,
        object: &str,
        name: &str,
        lease: Option<&mut PoolGuard<'_>>,
    ) -> Result<usize> {
        self.purge(table, field, object, name, HistoryFilter::Entity, lease)
    }

    /// Purge an attribute property history.
    pub fn purge_att_property(
        &self,
        table: &str,
        field: &str,
        object: &str,
        attribute: &str,
        name: &str,
        lease: Option<&mut PoolGuard<'_>>,
    ) -> Result<usize> {
        self.purge(table, field, object, name, HistoryFilter::Attribute(attribute), lease)
    }

    /// Purge a pipe property history.
    pub fn purge_pipe_property(
        &self,
        table: &str,
        field: &str,
        object: &str,
        pipe: &str,
        name: &str,
        lease: Option<&mut PoolGuard<'_>>,
    ) -> Result<usize> {
        self.purge(table, field, object, name, HistoryFilter::Pipe(pipe), lease)
    }
}
