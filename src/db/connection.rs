//! Connection module - one scoped session against the database

use crate::db::params::{ParamSet, Value};
use crate::db::result::ResultSet;
use crate::db::row::Row;
use crate::db::statement::Statement;
use crate::error::{Error, Result};
use crate::models::QueryResult;
use rusqlite::ToSql;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, MutexGuard};
use tracing::{debug, warn};

/// The engine connection behind a [`Connection`]: either the engine's
/// single in-memory connection, held under its lock, or one opened for
/// this checkout alone.
pub(crate) enum Handle<'e> {
    Shared(MutexGuard<'e, rusqlite::Connection>),
    Owned(rusqlite::Connection),
}

impl Deref for Handle<'_> {
    type Target = rusqlite::Connection;

    fn deref(&self) -> &rusqlite::Connection {
        match self {
            Handle::Shared(guard) => &**guard,
            Handle::Owned(conn) => conn,
        }
    }
}

/// Connection struct - exclusive use of one database session
///
/// The first statement issued outside a transaction begins one. Work is
/// persisted only by [`Connection::commit`]; whatever is still pending
/// when the connection is dropped is rolled back.
pub struct Connection<'e> {
    handle: Handle<'e>,
    id: u64,
    echo: bool,
    savepoint_seq: u32,
}

impl<'e> Connection<'e> {
    pub(crate) fn new(handle: Handle<'e>, id: u64, echo: bool) -> Self {
        Connection {
            handle,
            id,
            echo,
            savepoint_seq: 0,
        }
    }

    /// Engine-unique number of this checkout, as seen in log lines
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether a transaction is open on this connection
    pub fn in_transaction(&self) -> bool {
        !self.handle.is_autocommit()
    }

    /// Execute a statement with its pre-bound parameters
    pub fn execute(&mut self, statement: &Statement) -> Result<ResultSet> {
        self.run(statement, None)
    }

    /// Execute a statement; `params` override pre-bound values of the same name
    ///
    /// # Returns
    /// The rows of a query, or the change count of anything else
    pub fn execute_with(&mut self, statement: &Statement, params: &ParamSet) -> Result<ResultSet> {
        self.run(statement, Some(params))
    }

    /// Execute the same statement once per parameter set, in order
    ///
    /// Stops at the first failing set. Atomic only once committed as part
    /// of the surrounding transaction.
    pub fn execute_batch(
        &mut self,
        statement: &Statement,
        param_sets: &[ParamSet],
    ) -> Result<QueryResult> {
        self.autobegin()?;
        let mut stmt = self.handle.prepare_cached(statement.sql())?;
        if stmt.column_count() > 0 {
            return Err(Error::statement(
                "A statement that returns rows cannot be executed as a batch",
            ));
        }

        let mut summary = QueryResult::default();
        for params in param_sets {
            let params = statement.effective_params(Some(params));
            self.log_sql(statement.sql(), &params);

            let bindings = bind_values(&stmt, &params)?;
            let params_refs: Vec<(&str, &dyn ToSql)> = bindings
                .iter()
                .map(|(name, value)| (name.as_str(), *value as &dyn ToSql))
                .collect();

            summary.changes += stmt.execute(params_refs.as_slice())?;
            summary.last_insert_rowid = self.handle.last_insert_rowid();
        }
        Ok(summary)
    }

    /// Execute several `;`-separated statements that take no parameters
    pub fn exec_script(&mut self, sql: &str) -> Result<QueryResult> {
        self.autobegin()?;
        self.log_sql(sql, &ParamSet::new());
        self.handle.execute_batch(sql)?;
        Ok(QueryResult {
            changes: self.handle.changes() as usize,
            last_insert_rowid: self.handle.last_insert_rowid(),
        })
    }

    /// Make everything since the last commit or rollback durable
    ///
    /// Does nothing when no transaction is pending.
    pub fn commit(&mut self) -> Result<()> {
        if !self.in_transaction() {
            debug!(connection = self.id, "commit with no transaction pending");
            return Ok(());
        }
        self.control("COMMIT")
    }

    /// Discard everything since the last commit or rollback
    ///
    /// Does nothing when no transaction is pending.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction() {
            debug!(connection = self.id, "rollback with no transaction pending");
            return Ok(());
        }
        self.control("ROLLBACK")
    }

    /// Check if a table exists
    pub fn has_table(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.handle.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get list of all user tables in the database
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.handle.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub(crate) fn autobegin(&mut self) -> Result<()> {
        if !self.in_transaction() {
            echo!(self.echo, connection = self.id, "BEGIN (implicit)");
            self.handle.execute_batch("BEGIN DEFERRED")?;
        }
        Ok(())
    }

    /// Run a transaction-control statement (`BEGIN`, `COMMIT`, `SAVEPOINT sp_1`, ...)
    pub(crate) fn control(&mut self, sql: &str) -> Result<()> {
        echo!(self.echo, connection = self.id, "{}", sql);
        self.handle.execute_batch(sql)?;
        Ok(())
    }

    pub(crate) fn next_savepoint_name(&mut self) -> String {
        self.savepoint_seq += 1;
        format!("sp_{}", self.savepoint_seq)
    }

    fn run(&mut self, statement: &Statement, params: Option<&ParamSet>) -> Result<ResultSet> {
        self.autobegin()?;
        let params = statement.effective_params(params);
        self.log_sql(statement.sql(), &params);

        let mut stmt = self.handle.prepare_cached(statement.sql())?;
        let bindings = bind_values(&stmt, &params)?;
        let params_refs: Vec<(&str, &dyn ToSql)> = bindings
            .iter()
            .map(|(name, value)| (name.as_str(), *value as &dyn ToSql))
            .collect();

        if stmt.column_count() == 0 {
            let changes = stmt.execute(params_refs.as_slice())?;
            return Ok(ResultSet::from_changes(QueryResult {
                changes,
                last_insert_rowid: self.handle.last_insert_rowid(),
            }));
        }

        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut rows = stmt.query(params_refs.as_slice())?;

        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(Value::from))
                .collect::<rusqlite::Result<Vec<Value>>>()?;
            results.push(Row::new(columns.clone(), values));
        }

        Ok(ResultSet::from_rows(columns, results))
    }

    fn log_sql(&self, sql: &str, params: &ParamSet) {
        echo!(self.echo, connection = self.id, params = %params, "{}", sql);
    }
}

impl fmt::Debug for Connection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        if self.in_transaction() {
            echo!(self.echo, connection = self.id, "ROLLBACK");
            if let Err(e) = self.handle.execute_batch("ROLLBACK") {
                warn!(connection = self.id, error = %e, "rollback on release failed");
            }
        }
        debug!(connection = self.id, "connection released");
    }
}

/// Pair every placeholder of a prepared statement with its value
///
/// # Arguments
/// * `stmt` - The prepared statement
/// * `params` - Values keyed by placeholder name (without prefix)
///
/// # Returns
/// (name with prefix, value) pairs ready for named binding
fn bind_values<'p>(
    stmt: &rusqlite::Statement<'_>,
    params: &'p ParamSet,
) -> Result<Vec<(String, &'p Value)>> {
    let mut bindings = Vec::with_capacity(stmt.parameter_count());
    for i in 1..=stmt.parameter_count() {
        let name = stmt.parameter_name(i).ok_or_else(|| {
            Error::statement(format!(
                "Anonymous parameter at position {} cannot be bound by name",
                i
            ))
        })?;
        let key = &name[1..];
        let value = params.get(key).ok_or_else(|| {
            Error::statement(format!("A value is required for bind parameter '{}'", key))
        })?;
        bindings.push((name.to_string(), value));
    }
    Ok(bindings)
}
