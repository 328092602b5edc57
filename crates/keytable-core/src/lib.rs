//! keytable - key-value lookup tables backed by a remote SQL service.
//!
//! This crate presents a remote ws4sql database as a string-to-string lookup
//! table. A host configures the SQL behind each operation; the table handles
//! the wire protocol, result shaping, and an optional LRU cache that serves
//! stale entries while refreshing them in the background.
//!
//! # Example
//!
//! ```rust,ignore
//! use keytable::{SqlTable, TableConfig};
//!
//! #[tokio::main]
//! async fn main() -> keytable::Result<()> {
//!     let config = TableConfig {
//!         url: "http://127.0.0.1:12321/maildb".into(),
//!         lookup: Some("SELECT value FROM aliases WHERE key = :key".into()),
//!         ..TableConfig::default()
//!     };
//!     let table = SqlTable::connect("ws4sql_query", "aliases", &config).await?;
//!
//!     if let Some(value) = table.lookup("postmaster").await? {
//!         println!("postmaster -> {}", value);
//!     }
//!
//!     table.close();
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod executor;
pub mod registry;
pub mod table;

// Re-export commonly used types
pub use backend::{Request, RequestBuilder, Ws4sqlClient};
pub use cache::{CacheStats, QueryCache};
pub use cancel::CancellationToken;
pub use config::TableConfig;
pub use error::{OpContext, Result, TableError};
pub use executor::{CachingExecutor, DirectExecutor, QueryExecutor};
pub use registry::{MutableTable, Table, TableFactory, TableRegistry, MODULE_NAME};
pub use table::SqlTable;
