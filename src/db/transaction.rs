//! Transaction module - closure-scoped transactions and savepoints

use crate::db::connection::Connection;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// How a transaction takes its locks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionMode {
    /// Lock on first read/write
    #[default]
    Deferred,
    /// Take the write lock at BEGIN
    Immediate,
    /// Take an exclusive lock at BEGIN
    Exclusive,
}

impl TransactionMode {
    pub fn as_sql(&self) -> &'static str {
        match self {
            TransactionMode::Deferred => "DEFERRED",
            TransactionMode::Immediate => "IMMEDIATE",
            TransactionMode::Exclusive => "EXCLUSIVE",
        }
    }
}

impl FromStr for TransactionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "deferred" => Ok(TransactionMode::Deferred),
            "immediate" => Ok(TransactionMode::Immediate),
            "exclusive" => Ok(TransactionMode::Exclusive),
            other => Err(Error::Config(format!("Unknown transaction mode: {}", other))),
        }
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl<'e> Connection<'e> {
    /// Run `f` inside a deferred transaction on this connection
    ///
    /// Commits when `f` returns `Ok`; rolls back and hands the error back
    /// unchanged when it returns `Err`.
    pub fn transaction<F, T, E>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        self.transaction_with(TransactionMode::Deferred, f)
    }

    /// Like [`Connection::transaction`], with an explicit lock mode
    pub fn transaction_with<F, T, E>(
        &mut self,
        mode: TransactionMode,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        if self.in_transaction() {
            return Err(Error::statement(
                "A transaction is already begun on this connection; commit or roll it back first",
            )
            .into());
        }
        self.control(&format!("BEGIN {}", mode.as_sql()))?;

        match f(self) {
            Ok(value) => {
                if let Err(err) = self.commit() {
                    self.rollback_quietly();
                    return Err(err.into());
                }
                Ok(value)
            }
            Err(err) => {
                self.rollback_quietly();
                Err(err)
            }
        }
    }

    /// Run `f` inside a savepoint
    ///
    /// Begins the enclosing transaction first if none is open. On `Err`
    /// only the work done inside the savepoint is undone.
    pub fn savepoint<F, T, E>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        self.autobegin()?;
        let name = self.next_savepoint_name();
        self.control(&format!("SAVEPOINT {}", name))?;

        match f(self) {
            Ok(value) => {
                self.control(&format!("RELEASE SAVEPOINT {}", name))?;
                Ok(value)
            }
            Err(err) => {
                let undo = self
                    .control(&format!("ROLLBACK TO SAVEPOINT {}", name))
                    .and_then(|_| self.control(&format!("RELEASE SAVEPOINT {}", name)));
                if let Err(e) = undo {
                    warn!(connection = self.id(), savepoint = %name, error = %e, "savepoint rollback failed");
                }
                Err(err)
            }
        }
    }

    fn rollback_quietly(&mut self) {
        if let Err(e) = self.rollback() {
            warn!(connection = self.id(), error = %e, "rollback failed");
        }
    }
}
