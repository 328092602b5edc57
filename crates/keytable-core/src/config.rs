//! Configuration for ws4sql-backed tables.
//!
//! [`TableConfig`] mirrors the directives a host passes when it instantiates
//! a table: the backend URL, the query templates for each operation, and the
//! cache bound. Timing constants shared by the backend client and the cache
//! live in the const holders below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    /// Timeout for one backend round-trip made on behalf of a caller.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    /// Budget for one detached cache refresh, independent of any caller.
    pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Cache-related configuration.
pub struct CacheConfig;

impl CacheConfig {
    /// Age beyond which a cached result is served stale and refreshed.
    pub const STALE_AFTER: Duration = Duration::from_secs(30 * 60);
    /// Entry bound applied when the host does not set `cache_size`.
    pub const DEFAULT_CAPACITY: i64 = 10_000;
}

fn default_cache_size() -> i64 {
    CacheConfig::DEFAULT_CAPACITY
}

/// Configuration for a single ws4sql-backed table instance.
///
/// Only `url` and `lookup` are required. Every other template is optional;
/// a missing (or empty) template marks the corresponding operation as
/// unsupported, which surfaces as [`TableError::NotMutable`] when a caller
/// attempts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Backend endpoint, e.g. `http://127.0.0.1:12321/mydb`.
    #[serde(default)]
    pub url: String,
    /// Statements executed once at startup, in order. Any failure aborts
    /// table construction.
    #[serde(default)]
    pub init: Vec<String>,
    /// Row-set query answering lookups. Binds `:key`.
    #[serde(default)]
    pub lookup: Option<String>,
    /// Insert statement for new keys. Binds `:key` and `:value`.
    #[serde(default)]
    pub add: Option<String>,
    /// Update statement for existing keys. Binds `:key` and `:value`.
    #[serde(default)]
    pub set: Option<String>,
    /// Delete statement. Binds `:key`.
    #[serde(default)]
    pub del: Option<String>,
    /// Row-set query enumerating all keys. Binds nothing.
    #[serde(default)]
    pub list: Option<String>,
    /// Cache capacity in entries. Zero or negative disables caching.
    #[serde(default = "default_cache_size")]
    pub cache_size: i64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            init: Vec::new(),
            lookup: None,
            add: None,
            set: None,
            del: None,
            list: None,
            cache_size: CacheConfig::DEFAULT_CAPACITY,
        }
    }
}

impl TableConfig {
    /// Check that the required directives are present and well-formed.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(TableError::Config {
                message: "missing 'url' directive".into(),
            });
        }
        url::Url::parse(&self.url).map_err(|err| TableError::Config {
            message: format!("invalid 'url' directive '{}': {}", self.url, err),
        })?;
        if self.lookup_template().is_none() {
            return Err(TableError::Config {
                message: "missing 'lookup' directive".into(),
            });
        }
        Ok(())
    }

    /// The lookup query, if configured and non-empty.
    pub fn lookup_template(&self) -> Option<&str> {
        Self::present(&self.lookup)
    }

    /// The insert statement, if configured and non-empty.
    pub fn add_template(&self) -> Option<&str> {
        Self::present(&self.add)
    }

    /// The update statement, if configured and non-empty.
    pub fn set_template(&self) -> Option<&str> {
        Self::present(&self.set)
    }

    /// The delete statement, if configured and non-empty.
    pub fn del_template(&self) -> Option<&str> {
        Self::present(&self.del)
    }

    /// The key enumeration query, if configured and non-empty.
    pub fn list_template(&self) -> Option<&str> {
        Self::present(&self.list)
    }

    // Hosts sometimes pass an empty string for "not configured".
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|text| !text.trim().is_empty())
    }
}
