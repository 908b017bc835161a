//! Engine configuration and connection-URL parsing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Connection URL, e.g. `sqlite://` or `sqlite:///data/app.db`.
    pub url: String,
    /// Log every statement at info level instead of debug.
    pub echo: bool,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Enforce foreign key constraints.
    pub foreign_keys: bool,
    /// Journal mode for file databases (`WAL`, `DELETE`, ...).
    pub journal_mode: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://".to_string(),
            echo: false,
            busy_timeout_ms: 5000,
            foreign_keys: true,
            journal_mode: None,
        }
    }
}

/// Where a connection URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Memory,
    File(PathBuf),
}

impl EngineConfig {
    /// Configuration for `url` with every other field defaulted.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve the URL into a target, applying any URL query options to
    /// the returned configuration.
    pub fn resolve(&self) -> Result<(Target, EngineConfig)> {
        let mut config = self.clone();
        let parsed = parse_url(&self.url)?;
        if let Some(timeout) = parsed.timeout_ms {
            config.busy_timeout_ms = timeout;
        }
        Ok((parsed.target, config))
    }
}

/// Parsed form of a connection URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUrl {
    pub target: Target,
    /// Driver suffix of the scheme (`pysqlite` in `sqlite+pysqlite://`).
    pub driver: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Parse `sqlite[+driver]://[/path][?timeout=seconds]`.
pub fn parse_url(url: &str) -> Result<ParsedUrl> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| Error::Config(format!("Not a connection URL: {}", url)))?;

    let driver = match scheme.split_once('+') {
        Some(("sqlite", driver)) if !driver.is_empty() => Some(driver.to_string()),
        None if scheme == "sqlite" => None,
        _ => {
            return Err(Error::Config(format!(
                "Unsupported database scheme: {}",
                scheme
            )))
        }
    };

    let (location, query) = match rest.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (rest, None),
    };

    let mut timeout_ms = None;
    for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "timeout" => {
                let seconds: f64 = value.parse().map_err(|_| {
                    Error::Config(format!("Invalid timeout value: {}", value))
                })?;
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(Error::Config(format!("Invalid timeout value: {}", value)));
                }
                timeout_ms = Some((seconds * 1000.0).round() as u64);
            }
            other => {
                return Err(Error::Config(format!("Unsupported URL option: {}", other)));
            }
        }
    }

    // The host part is always empty for SQLite; what follows the third
    // slash is the path, so `////abs` keeps its leading slash.
    let target = match location {
        "" | "/:memory:" => Target::Memory,
        path => match path.strip_prefix('/') {
            Some(path) if !path.is_empty() => Target::File(PathBuf::from(path)),
            _ => {
                return Err(Error::Config(format!(
                    "Expected an empty host in URL: {}",
                    url
                )))
            }
        },
    };

    Ok(ParsedUrl {
        target,
        driver,
        timeout_ms,
    })
}
