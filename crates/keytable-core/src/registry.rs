//! Host-facing table contract and backend registry.
//!
//! A host that multiplexes lookup tables talks to them through the [`Table`]
//! and [`MutableTable`] traits and instantiates them by stable module name
//! through a [`TableRegistry`], so backends stay interchangeable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

use crate::config::TableConfig;
use crate::error::{Result, TableError};
use crate::table::SqlTable;

/// Stable name the ws4sql-backed table registers under.
pub const MODULE_NAME: &str = "ws4sql_query";

/// Read-only key-value table as a host sees it.
#[async_trait]
pub trait Table: Send + Sync {
    /// Module name this table registered under.
    fn name(&self) -> &str;

    /// Instance name distinguishing this table from its siblings.
    fn instance_name(&self) -> &str;

    /// First value mapped to `key`, or `None` when the key is absent.
    async fn lookup(&self, key: &str) -> Result<Option<String>>;

    /// Every value mapped to `key`, in backend order.
    async fn lookup_multi(&self, key: &str) -> Result<Vec<String>>;

    /// Release resources held by the table.
    fn close(&self);
}

/// A table that additionally supports enumeration and mutation.
///
/// Whether the operations actually work depends on the instance's
/// configuration; a missing template surfaces as
/// [`TableError::NotMutable`](crate::error::TableError::NotMutable).
#[async_trait]
pub trait MutableTable: Table {
    /// All keys currently in the table.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Map `key` to `value`, updating in place when the key exists.
    async fn set_key(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`.
    async fn remove_key(&self, key: &str) -> Result<()>;
}

/// Constructor producing a table from its identity pair and configuration.
pub type TableFactory = Arc<
    dyn Fn(String, String, TableConfig) -> BoxFuture<'static, Result<Arc<dyn MutableTable>>>
        + Send
        + Sync,
>;

/// Maps stable module names to table constructors.
pub struct TableRegistry {
    factories: HashMap<&'static str, TableFactory>,
}

impl TableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with every built-in backend registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            MODULE_NAME,
            Arc::new(|module, instance, config| {
                Box::pin(async move {
                    let table = SqlTable::connect(module, instance, &config).await?;
                    Ok(Arc::new(table) as Arc<dyn MutableTable>)
                })
            }),
        );
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &'static str, factory: TableFactory) {
        debug!("Registering table backend '{}'", name);
        self.factories.insert(name, factory);
    }

    /// Instantiate the backend registered under `name`.
    pub async fn create(
        &self,
        name: &str,
        instance: &str,
        config: TableConfig,
    ) -> Result<Arc<dyn MutableTable>> {
        let factory = self.factories.get(name).ok_or_else(|| TableError::Config {
            message: format!("no table backend registered under '{}'", name),
        })?;
        factory(name.to_string(), instance.to_string(), config).await
    }

    /// Check whether `name` has a registered backend.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_builtin_registry_knows_ws4sql() {
        let registry = TableRegistry::with_builtin();
        assert!(registry.contains(MODULE_NAME));
        assert_eq!(registry.names(), vec![MODULE_NAME]);
    }

    #[tokio::test]
    async fn test_create_unknown_backend_rejected() {
        let registry = TableRegistry::new();
        let err = registry
            .create("no_such_backend", "main", TableConfig::default())
            .await
            .err()
            .expect("unknown backend must be rejected");
        assert!(matches!(err, TableError::Config { .. }));
        assert!(err.to_string().contains("no_such_backend"));
    }

    #[tokio::test]
    async fn test_create_builds_working_table() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"success": true, "resultSet": [{"v": "a@example.org"}]}]
            })))
            .mount(&server)
            .await;

        let registry = TableRegistry::with_builtin();
        let config = TableConfig {
            url: format!("{}/db", server.uri()),
            lookup: Some("SELECT v FROM kv WHERE k = :key".into()),
            ..TableConfig::default()
        };
        let table = registry.create(MODULE_NAME, "aliases", config).await.unwrap();

        assert_eq!(table.name(), MODULE_NAME);
        assert_eq!(table.instance_name(), "aliases");
        assert_eq!(
            table.lookup("alice").await.unwrap(),
            Some("a@example.org".to_string())
        );
        table.close();
    }

    #[tokio::test]
    async fn test_create_propagates_invalid_config() {
        let registry = TableRegistry::with_builtin();
        let err = registry
            .create(MODULE_NAME, "main", TableConfig::default())
            .await
            .err()
            .expect("empty config must be rejected");
        assert!(matches!(err, TableError::Config { .. }));
    }
}
