//! Transactional statement runner over SQLite.
//!
//! An [`Engine`] describes how to reach a database and hands out scoped
//! [`Connection`]s. Statements are SQL text with `:name` placeholders,
//! executed with per-call, batched or pre-bound parameters. Work is
//! committed explicitly ([`Connection::commit`]) or by a closure scope
//! ([`Engine::begin`]) that commits on `Ok` and rolls back on `Err`.

// Statement and transaction log lines go to info when the engine echoes, debug otherwise.
macro_rules! echo {
    ($echo:expr, $($arg:tt)+) => {
        if $echo {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

pub mod config;
pub mod db;
mod error;
mod models;

pub use config::{EngineConfig, Target};
pub use db::{
    text, Connection, Engine, FromRow, ParamSet, ResultSet, Row, RowIndex, RowMapping, Session,
    Statement, TransactionMode, Value,
};
pub use error::{Error, Result};
pub use models::QueryResult;

/// Version of the bundled SQLite library
pub fn sqlite_version() -> String {
    rusqlite::version().to_string()
}
