//! The table facade: key-value operations over a remote SQL backend.
//!
//! A [`SqlTable`] owns the query templates from its configuration and an
//! executor to run them through. Operations build a parameterized request,
//! hand it to the executor under an operation-specific cache key, and shape
//! the result into lookup-table semantics: an absent key is `None`, never an
//! error.

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::backend::{RequestBuilder, Ws4sqlClient};
use crate::config::TableConfig;
use crate::error::{OpContext, Result, TableError};
use crate::executor::{CachingExecutor, DirectExecutor, QueryExecutor};
use crate::registry::{MutableTable, Table};

// Cache keys are namespaced by operation so single and multi lookups never
// share an entry.
const LOOKUP_KEY_PREFIX: char = 'L';
const MULTI_KEY_PREFIX: char = 'M';
const LIST_CACHE_KEY: &str = "K";

/// A key-value lookup table backed by a ws4sql database.
pub struct SqlTable {
    mod_name: String,
    inst_name: String,
    lookup: String,
    add: Option<String>,
    set: Option<String>,
    del: Option<String>,
    list: Option<String>,
    executor: Box<dyn QueryExecutor>,
}

impl fmt::Debug for SqlTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlTable")
            .field("module", &self.mod_name)
            .field("instance", &self.inst_name)
            .finish_non_exhaustive()
    }
}

impl SqlTable {
    /// Build a table from `config`, running its init statements against the
    /// backend.
    ///
    /// Init statements go out as a single transaction, so any failure rolls
    /// back the batch and aborts construction. When `cache_size` is positive
    /// the executor is wrapped in a [`CachingExecutor`] bounded to that many
    /// entries.
    pub async fn connect(
        mod_name: impl Into<String>,
        inst_name: impl Into<String>,
        config: &TableConfig,
    ) -> Result<Self> {
        let mod_name = mod_name.into();
        let inst_name = inst_name.into();
        config.validate()?;

        let lookup = config
            .lookup_template()
            .ok_or_else(|| TableError::Config {
                message: "missing 'lookup' directive".into(),
            })?
            .to_string();

        let client = Ws4sqlClient::new(&config.url)?;
        let direct = DirectExecutor::new(client);

        if !config.init.is_empty() {
            let mut builder = RequestBuilder::new();
            for statement in &config.init {
                builder = builder.add_statement(statement);
            }
            let init_context = OpContext {
                module: mod_name.clone(),
                instance: inst_name.clone(),
                operation: "init",
                key: None,
            };
            let request = builder
                .build()
                .map_err(|err| err.with_context(init_context.clone()))?;
            direct
                .exec(&request)
                .await
                .map_err(|err| err.with_context(init_context))?;
        }

        let executor: Box<dyn QueryExecutor> = if config.cache_size > 0 {
            Box::new(CachingExecutor::new(direct, config.cache_size))
        } else {
            Box::new(direct)
        };

        info!(
            "{}/{} connected to {} (cache_size={})",
            mod_name, inst_name, config.url, config.cache_size
        );

        Ok(Self {
            mod_name,
            inst_name,
            lookup,
            add: config.add_template().map(str::to_string),
            set: config.set_template().map(str::to_string),
            del: config.del_template().map(str::to_string),
            list: config.list_template().map(str::to_string),
            executor,
        })
    }

    /// Module name this table was registered under.
    pub fn name(&self) -> &str {
        &self.mod_name
    }

    /// Instance name distinguishing this table from its siblings.
    pub fn instance_name(&self) -> &str {
        &self.inst_name
    }

    /// Look up `key`, returning the first matching value.
    ///
    /// An absent key is `Ok(None)`, not an error.
    pub async fn lookup(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .run_lookup(key, format!("{}{}", LOOKUP_KEY_PREFIX, key))
            .await
            .map_err(|err| err.with_context(self.context("lookup", Some(key))))?;
        Ok(values.into_iter().next())
    }

    /// Look up `key`, returning every matching value in backend order.
    pub async fn lookup_multi(&self, key: &str) -> Result<Vec<String>> {
        self.run_lookup(key, format!("{}{}", MULTI_KEY_PREFIX, key))
            .await
            .map_err(|err| err.with_context(self.context("lookup-multi", Some(key))))
    }

    /// All keys in the table. Requires the `list` template.
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.run_list()
            .await
            .map_err(|err| err.with_context(self.context("list", None)))
    }

    /// Delete `key`. Requires the `del` template. Deleting an absent key is
    /// not an error.
    pub async fn remove_key(&self, key: &str) -> Result<()> {
        self.run_delete(key)
            .await
            .map_err(|err| err.with_context(self.context("del", Some(key))))
    }

    /// Map `key` to `value`, updating in place when the key already exists.
    ///
    /// Requires both `set` and `add` templates. The update statement runs
    /// first; the insert fires only when the update touched no rows.
    pub async fn set_key(&self, key: &str, value: &str) -> Result<()> {
        let updated = self
            .run_update(key, value)
            .await
            .map_err(|err| err.with_context(self.context("set", Some(key))))?;
        if updated == 0 {
            self.run_insert(key, value)
                .await
                .map_err(|err| err.with_context(self.context("add", Some(key))))?;
        }
        Ok(())
    }

    /// Release the backend connection and drop any cached results.
    ///
    /// Refreshes still in flight are abandoned, not awaited.
    pub fn close(&self) {
        debug!("{}/{} closing", self.mod_name, self.inst_name);
        self.executor.close();
    }

    async fn run_lookup(&self, key: &str, cache_key: String) -> Result<Vec<String>> {
        let request = RequestBuilder::new()
            .add_query(&self.lookup)
            .bind("key", key)
            .build()?;
        self.executor.query(&cache_key, &request).await
    }

    async fn run_list(&self) -> Result<Vec<String>> {
        let Some(list) = &self.list else {
            return Err(TableError::NotMutable { directive: "list" });
        };
        let request = RequestBuilder::new().add_query(list).build()?;
        self.executor.query(LIST_CACHE_KEY, &request).await
    }

    async fn run_delete(&self, key: &str) -> Result<()> {
        let Some(del) = &self.del else {
            return Err(TableError::NotMutable { directive: "del" });
        };
        let request = RequestBuilder::new()
            .add_statement(del)
            .bind("key", key)
            .build()?;
        self.executor.exec(&request).await?;
        Ok(())
    }

    async fn run_update(&self, key: &str, value: &str) -> Result<u64> {
        let Some(set) = &self.set else {
            return Err(TableError::NotMutable { directive: "set" });
        };
        if self.add.is_none() {
            return Err(TableError::NotMutable { directive: "add" });
        }
        let request = RequestBuilder::new()
            .add_statement(set)
            .bind("key", key)
            .bind("value", value)
            .build()?;
        let counts = self.executor.exec(&request).await?;
        counts.first().copied().ok_or_else(|| TableError::Remote {
            message: "update statement returned no result".into(),
        })
    }

    async fn run_insert(&self, key: &str, value: &str) -> Result<()> {
        let Some(add) = &self.add else {
            return Err(TableError::NotMutable { directive: "add" });
        };
        let request = RequestBuilder::new()
            .add_statement(add)
            .bind("key", key)
            .bind("value", value)
            .build()?;
        self.executor.exec(&request).await?;
        Ok(())
    }

    fn context(&self, operation: &'static str, key: Option<&str>) -> OpContext {
        OpContext {
            module: self.mod_name.clone(),
            instance: self.inst_name.clone(),
            operation,
            key: key.map(str::to_string),
        }
    }
}

#[async_trait]
impl Table for SqlTable {
    fn name(&self) -> &str {
        SqlTable::name(self)
    }

    fn instance_name(&self) -> &str {
        SqlTable::instance_name(self)
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>> {
        SqlTable::lookup(self, key).await
    }

    async fn lookup_multi(&self, key: &str) -> Result<Vec<String>> {
        SqlTable::lookup_multi(self, key).await
    }

    fn close(&self) {
        SqlTable::close(self)
    }
}

#[async_trait]
impl MutableTable for SqlTable {
    async fn keys(&self) -> Result<Vec<String>> {
        SqlTable::keys(self).await
    }

    async fn set_key(&self, key: &str, value: &str) -> Result<()> {
        SqlTable::set_key(self, key, value).await
    }

    async fn remove_key(&self, key: &str) -> Result<()> {
        SqlTable::remove_key(self, key).await
    }
}
