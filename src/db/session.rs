//! Session module - statement execution without holding a connection up front

use crate::db::connection::Connection;
use crate::db::engine::Engine;
use crate::db::params::ParamSet;
use crate::db::result::ResultSet;
use crate::db::statement::Statement;
use crate::error::Result;
use crate::models::QueryResult;

/// Session struct - checks a connection out on first use and gives it
/// back on commit, rollback or drop
#[derive(Debug)]
pub struct Session<'e> {
    engine: &'e Engine,
    conn: Option<Connection<'e>>,
}

impl<'e> Session<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Session { engine, conn: None }
    }

    /// Whether the session currently holds a connection
    pub fn is_active(&self) -> bool {
        self.conn.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::in_transaction)
    }

    /// The session's connection, checking one out if needed
    pub fn connection(&mut self) -> Result<&mut Connection<'e>> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.engine.connect()?,
        };
        Ok(self.conn.insert(conn))
    }

    pub fn execute(&mut self, statement: &Statement) -> Result<ResultSet> {
        self.connection()?.execute(statement)
    }

    pub fn execute_with(&mut self, statement: &Statement, params: &ParamSet) -> Result<ResultSet> {
        self.connection()?.execute_with(statement, params)
    }

    pub fn execute_batch(
        &mut self,
        statement: &Statement,
        param_sets: &[ParamSet],
    ) -> Result<QueryResult> {
        self.connection()?.execute_batch(statement, param_sets)
    }

    /// Commit pending work and release the connection
    pub fn commit(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(mut conn) => conn.commit(),
            None => Ok(()),
        }
    }

    /// Roll back pending work and release the connection
    pub fn rollback(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(mut conn) => conn.rollback(),
            None => Ok(()),
        }
    }

    /// Release the connection, discarding anything uncommitted
    pub fn close(mut self) -> Result<()> {
        self.rollback()
    }
}
