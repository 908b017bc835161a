//! Engine module - provides the Engine handle that hands out connections

use crate::config::{EngineConfig, Target};
use crate::db::connection::{Connection, Handle};
use crate::db::session::Session;
use crate::db::transaction::TransactionMode;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, TryLockError};
use std::time::Duration;
use tracing::{debug, info};

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

/// Engine struct - how to reach one database, and the factory for
/// connections to it
///
/// File databases get a fresh SQLite connection per checkout. An
/// in-memory database lives only as long as its one SQLite connection,
/// so the engine keeps that connection and lends it to one checkout at
/// a time.
pub struct Engine {
    config: EngineConfig,
    target: Target,
    shared: Option<Mutex<rusqlite::Connection>>,
    next_id: AtomicU64,
}

impl Engine {
    /// Create a new Engine from a configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        let (target, config) = config.resolve()?;

        if let Some(mode) = &config.journal_mode {
            if !JOURNAL_MODES.contains(&mode.to_ascii_uppercase().as_str()) {
                return Err(Error::Config(format!("Unknown journal mode: {}", mode)));
            }
        }

        let shared = match target {
            Target::Memory => Some(Mutex::new(open(&target, &config)?)),
            Target::File(_) => None,
        };

        info!(url = %config.url, echo = config.echo, "engine created");

        Ok(Engine {
            config,
            target,
            shared,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a new Engine from a connection URL with default settings
    pub fn from_url(url: &str) -> Result<Self> {
        Self::new(EngineConfig::from_url(url))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Check out a connection in explicit-commit mode
    ///
    /// Fails with a connection error if this is an in-memory engine whose
    /// connection is already checked out.
    pub fn connect(&self) -> Result<Connection<'_>> {
        let handle = match &self.shared {
            Some(shared) => match shared.try_lock() {
                Ok(guard) => Handle::Shared(guard),
                // The holder's drop already rolled back whatever it left open
                Err(TryLockError::Poisoned(poisoned)) => Handle::Shared(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    return Err(Error::connection(
                        "The in-memory database is already in use by another connection",
                    ))
                }
            },
            None => Handle::Owned(open(&self.target, &self.config)?),
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(connection = id, "connection checked out");
        Ok(Connection::new(handle, id, self.config.echo))
    }

    /// Run `f` on a fresh connection inside a transaction
    ///
    /// Commits when `f` returns `Ok`. When it returns `Err`, rolls back
    /// before handing the error back. The connection is released either way.
    pub fn begin<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Connection<'_>) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        self.begin_with(TransactionMode::Deferred, f)
    }

    /// Like [`Engine::begin`], with an explicit lock mode
    pub fn begin_with<F, T, E>(&self, mode: TransactionMode, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Connection<'_>) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut conn = self.connect()?;
        conn.transaction_with(mode, f)
    }

    /// Start a session bound to this engine
    pub fn session(&self) -> Session<'_> {
        Session::new(self)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("url", &self.config.url)
            .field("target", &self.target)
            .finish()
    }
}

/// Open and configure a new SQLite connection for `target`
fn open(target: &Target, config: &EngineConfig) -> Result<rusqlite::Connection> {
    let conn = match target {
        Target::Memory => rusqlite::Connection::open_in_memory(),
        Target::File(path) => rusqlite::Connection::open(path),
    }
    .map_err(|e| Error::Connection {
        message: format!("Cannot open {}: {}", config.url, e),
        source: Some(e),
    })?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.execute_batch(if config.foreign_keys {
        "PRAGMA foreign_keys = ON"
    } else {
        "PRAGMA foreign_keys = OFF"
    })?;

    if let (Target::File(_), Some(mode)) = (target, &config.journal_mode) {
        let applied: String = conn.query_row(
            &format!("PRAGMA journal_mode = {}", mode.to_ascii_uppercase()),
            [],
            |row| row.get(0),
        )?;
        debug!(journal_mode = %applied, "journal mode set");
    }

    Ok(conn)
}
