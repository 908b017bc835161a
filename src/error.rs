//! Error types for the statement runner.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the statement runner.
#[derive(Error, Debug)]
pub enum Error {
    // Statement errors: malformed SQL, unknown table/column, bad bindings
    #[error("Statement error: {message}")]
    Statement {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Constraint violation: {message}")]
    Constraint {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Row access errors
    #[error("Type mismatch: {0}")]
    Type(String),

    #[error("No such column: {0}")]
    InvalidColumn(String),

    #[error("No row was found when one was required")]
    NoRows,

    #[error("Multiple rows were found when exactly one was required")]
    MultipleRows,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a statement error that did not come from the engine.
    pub fn statement<S: Into<String>>(msg: S) -> Self {
        Error::Statement {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error that did not come from the engine.
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Error::Connection {
            message: msg.into(),
            source: None,
        }
    }

    pub fn is_statement(&self) -> bool {
        matches!(self, Error::Statement { .. })
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Error::Constraint { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        let message = err.to_string();
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::ConstraintViolation => Error::Constraint {
                    message,
                    source: err,
                },
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::PermissionDenied
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt => Error::Connection {
                    message,
                    source: Some(err),
                },
                _ => Error::Statement {
                    message,
                    source: Some(err),
                },
            },
            rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => Error::Type(message),
            rusqlite::Error::InvalidColumnIndex(_) | rusqlite::Error::InvalidColumnName(_) => {
                Error::InvalidColumn(message)
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NoRows,
            _ => Error::Statement {
                message,
                source: Some(err),
            },
        }
    }
}
