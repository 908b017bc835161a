//! Result module - the rows and metadata produced by one execution

use crate::db::params::Value;
use crate::db::row::{FromRow, Row, RowMapping};
use crate::error::{Error, Result};
use crate::models::QueryResult;
use rusqlite::types::FromSql;
use std::sync::Arc;

/// Outcome of executing a statement
///
/// Iterates the returned rows in the order the engine produced them.
/// Statements that return no rows still report affected-row counts.
#[derive(Debug)]
pub struct ResultSet {
    columns: Arc<[String]>,
    rows: std::vec::IntoIter<Row>,
    rows_affected: usize,
    last_insert_rowid: i64,
}

impl ResultSet {
    pub(crate) fn from_rows(columns: Arc<[String]>, rows: Vec<Row>) -> Self {
        ResultSet {
            columns,
            rows: rows.into_iter(),
            rows_affected: 0,
            last_insert_rowid: 0,
        }
    }

    pub(crate) fn from_changes(summary: QueryResult) -> Self {
        ResultSet {
            columns: Arc::from(Vec::new()),
            rows: Vec::new().into_iter(),
            rows_affected: summary.changes,
            last_insert_rowid: summary.last_insert_rowid,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the statement was a query
    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Rows changed by an INSERT, UPDATE or DELETE; zero for queries and DDL
    pub fn rows_affected(&self) -> usize {
        self.rows_affected
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.last_insert_rowid
    }

    pub fn summary(&self) -> QueryResult {
        QueryResult {
            changes: self.rows_affected,
            last_insert_rowid: self.last_insert_rowid,
        }
    }

    /// All remaining rows
    pub fn all(self) -> Vec<Row> {
        self.rows.collect()
    }

    pub fn first(mut self) -> Option<Row> {
        self.rows.next()
    }

    /// Exactly one row, or `NoRows` / `MultipleRows`
    pub fn one(mut self) -> Result<Row> {
        let row = self.rows.next().ok_or(Error::NoRows)?;
        if self.rows.next().is_some() {
            return Err(Error::MultipleRows);
        }
        Ok(row)
    }

    /// First column of the first row, if there is a row
    pub fn scalar<T: FromSql>(mut self) -> Result<Option<T>> {
        match self.rows.next() {
            Some(row) => row.get(0usize).map(Some),
            None => Ok(None),
        }
    }

    /// Remaining rows as column name to value mappings
    pub fn mappings(self) -> impl Iterator<Item = RowMapping> {
        self.rows.map(Row::into_mapping)
    }

    /// Remaining rows unpacked into tuples
    pub fn tuples<T: FromRow>(self) -> Result<Vec<T>> {
        self.rows.map(|row| row.tuple()).collect()
    }

    /// Remaining rows as plain value vectors
    pub fn values(self) -> Vec<Vec<Value>> {
        self.rows.map(|row| row.values().to_vec()).collect()
    }
}

impl Iterator for ResultSet {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for ResultSet {}
