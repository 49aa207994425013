//! Named queries: SQL registered under a string key instead of inlined on a method.
//!
//! Keys are `<Domain>.<method>` for implicitly named queries, or any string a query
//! method names explicitly.

use crate::executor::LifeError;
use config::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Lookup of SQL by query name.
pub trait NamedQueries: Send + Sync {
    fn has_query(&self, name: &str) -> bool;

    /// SQL registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `LifeError::Configuration` if nothing is registered under `name`.
    fn get_query(&self, name: &str) -> Result<String, LifeError>;
}

/// Map-backed named queries, optionally loaded from a TOML file:
///
/// ```toml
/// [named_queries.User]
/// find_by_email = "SELECT * FROM users WHERE email = :email"
/// ```
///
/// Domain and method keys keep their case, so the table above registers
/// `User.find_by_email`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesNamedQueries {
    queries: HashMap<String, String>,
}

impl PropertiesNamedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.queries.insert(name.into(), sql.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, sql: impl Into<String>) {
        self.queries.insert(name.into(), sql.into());
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Load queries from a TOML file. A missing file yields an empty registry.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no named queries file at {}", path.display());
            return Ok(Self::empty());
        }

        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        let queries = Self::from_toml(&text)?;
        log::debug!("loaded {} named queries from {}", queries.len(), path.display());
        Ok(queries)
    }

    /// Parse queries from TOML text.
    // Parsed with `toml` directly: `config` lowercases keys, and query names are case sensitive.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: NamedQueriesFile = toml::from_str(text)
            .map_err(|e| ConfigError::Message(format!("Invalid named queries TOML: {e}")))?;

        let mut queries = Self::new();
        for (domain, methods) in file.named_queries {
            for (method, sql) in methods {
                queries.insert(format!("{domain}.{method}"), sql);
            }
        }
        Ok(queries)
    }
}

#[derive(Debug, Deserialize)]
struct NamedQueriesFile {
    #[serde(default)]
    named_queries: HashMap<String, HashMap<String, String>>,
}

impl NamedQueries for PropertiesNamedQueries {
    fn has_query(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    fn get_query(&self, name: &str) -> Result<String, LifeError> {
        self.queries
            .get(name)
            .cloned()
            .ok_or_else(|| LifeError::Configuration(format!("No named query registered under {name}")))
    }
}
