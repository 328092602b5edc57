//! Query execution abstraction.
//!
//! The table facade builds requests; an executor runs them. [`DirectExecutor`]
//! forwards every call to the backend, [`CachingExecutor`] decorates another
//! executor with a stale-while-revalidate cache. Both sides of the seam speak
//! [`QueryExecutor`], so caching is invisible to the facade.

mod caching;
mod direct;

pub use caching::CachingExecutor;
pub use direct::DirectExecutor;

use async_trait::async_trait;

use crate::backend::Request;
use crate::error::Result;

/// Executes parameterized transactions against a ws4sql backend.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a row-set query and return each row's first column, in backend
    /// order.
    ///
    /// `cache_key` names the logical identity of the result for caching
    /// decorators. Callers must use distinct keys for requests that can
    /// produce distinct results.
    async fn query(&self, cache_key: &str, request: &Request) -> Result<Vec<String>>;

    /// Run statements and return per-statement affected-row counts, in
    /// transaction order.
    async fn exec(&self, request: &Request) -> Result<Vec<u64>>;

    /// Release resources held by this executor. Idempotent.
    fn close(&self);
}
