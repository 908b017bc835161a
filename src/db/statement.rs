//! Statement module - SQL templates with named placeholders

use crate::db::params::{ParamSet, Value};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Matches `:name` placeholders that are not part of a `::` cast or a word.
static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^:\w]):([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Statement struct - SQL text, its placeholder names and pre-bound values
///
/// Cloning is cheap; the text is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: Arc<str>,
    placeholders: Arc<[String]>,
    bound: ParamSet,
}

/// Shorthand for [`Statement::new`]
pub fn text(sql: impl AsRef<str>) -> Statement {
    Statement::new(sql)
}

impl Statement {
    pub fn new(sql: impl AsRef<str>) -> Self {
        let sql = sql.as_ref();
        Statement {
            sql: Arc::from(sql),
            placeholders: scan_placeholders(sql).into(),
            bound: ParamSet::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Placeholder names in order of first appearance, without the `:`
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Values bound onto the statement ahead of execution
    pub fn bound(&self) -> &ParamSet {
        &self.bound
    }

    /// Return a copy of the statement with `name` pre-bound to `value`
    ///
    /// Fails if the text has no placeholder called `name`.
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        let key = name.trim_start_matches(':');
        if !self.placeholders.iter().any(|p| p == key) {
            return Err(Error::statement(format!(
                "This statement does not define a bound parameter named '{}'",
                key
            )));
        }
        self.bound.insert(key, value);
        Ok(self)
    }

    /// Pre-bind every value in `params`
    pub fn bind_all(self, params: &ParamSet) -> Result<Self> {
        params
            .iter()
            .try_fold(self, |stmt, (name, value)| stmt.bind(name, value.clone()))
    }

    /// Parameters for one execution: pre-bound values overlaid by `params`
    pub(crate) fn effective_params(&self, params: Option<&ParamSet>) -> ParamSet {
        match params {
            Some(params) => self.bound.merged(params),
            None => self.bound.clone(),
        }
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::new(sql)
    }
}

fn scan_placeholders(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_REGEX.captures_iter(sql) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
