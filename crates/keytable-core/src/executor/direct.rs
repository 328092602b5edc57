//! Executor that forwards every call to the backend.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::QueryExecutor;
use crate::backend::{cell_to_string, first_column, Request, Ws4sqlClient};
use crate::error::{Result, TableError};

/// Runs each transaction against a [`Ws4sqlClient`] as one round-trip.
///
/// No caching, no retries; whatever the backend reports is what the caller
/// sees. The executor exclusively owns the backend connection; `close()`
/// releases it, and later calls fail without touching the network.
#[derive(Debug)]
pub struct DirectExecutor {
    client: Mutex<Option<Ws4sqlClient>>,
}

impl DirectExecutor {
    pub fn new(client: Ws4sqlClient) -> Self {
        Self {
            client: Mutex::new(Some(client)),
        }
    }

    // Clones the handle out so no lock is held across the round-trip.
    fn client(&self) -> Result<Ws4sqlClient> {
        let guard = match self.client.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone().ok_or_else(|| TableError::Backend {
            message: "backend connection already released".into(),
            source: None,
        })
    }
}

#[async_trait]
impl QueryExecutor for DirectExecutor {
    async fn query(&self, _cache_key: &str, request: &Request) -> Result<Vec<String>> {
        let response = self.client()?.send(request).await?;
        let mut values = Vec::new();
        for result in &response.results {
            result.ensure_success()?;
            for row in result.result_set.as_deref().unwrap_or_default() {
                if let Some(cell) = first_column(row) {
                    values.push(cell_to_string(cell)?);
                }
            }
        }
        Ok(values)
    }

    async fn exec(&self, request: &Request) -> Result<Vec<u64>> {
        let response = self.client()?.send(request).await?;
        let mut counts = Vec::with_capacity(response.results.len());
        for result in &response.results {
            result.ensure_success()?;
            let rows = result.rows_updated.ok_or_else(|| TableError::Remote {
                message: "statement result carried no affected-row count".into(),
            })?;
            counts.push(rows);
        }
        Ok(counts)
    }

    fn close(&self) {
        let mut guard = match self.client.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(client) = guard.take() {
            debug!("Released backend connection to {}", client.endpoint());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RequestBuilder;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn executor_for(server: &MockServer) -> DirectExecutor {
        DirectExecutor::new(Ws4sqlClient::new(&format!("{}/db", server.uri())).unwrap())
    }

    fn lookup() -> Request {
        RequestBuilder::new()
            .add_query("SELECT v FROM kv WHERE k = :key")
            .bind("key", "alice")
            .build()
            .unwrap()
    }

    fn update() -> Request {
        RequestBuilder::new()
            .add_statement("UPDATE kv SET v = :value WHERE k = :key")
            .bind("key", "alice")
            .bind("value", "new")
            .build()
            .unwrap()
    }

    async fn respond(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_query_returns_first_columns_in_order() {
        let server = MockServer::start().await;
        respond(
            &server,
            json!({
                "results": [{
                    "success": true,
                    "resultSet": [
                        {"v": "first", "extra": 1},
                        {"v": "second", "extra": 2}
                    ]
                }]
            }),
        )
        .await;

        let executor = executor_for(&server).await;
        let values = executor.query("Lalice", &lookup()).await.unwrap();
        assert_eq!(values, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_query_converts_cell_kinds() {
        let server = MockServer::start().await;
        respond(
            &server,
            json!({
                "results": [{
                    "success": true,
                    "resultSet": [{"v": null}, {"v": 42}, {"v": 1.5}]
                }]
            }),
        )
        .await;

        let executor = executor_for(&server).await;
        let values = executor.query("Lalice", &lookup()).await.unwrap();
        assert_eq!(values, vec!["", "42", "1.5"]);
    }

    #[tokio::test]
    async fn test_query_empty_result_set() {
        let server = MockServer::start().await;
        respond(&server, json!({"results": [{"success": true, "resultSet": []}]})).await;

        let executor = executor_for(&server).await;
        let values = executor.query("Lnobody", &lookup()).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_query_item_failure_surfaces_as_remote() {
        let server = MockServer::start().await;
        respond(
            &server,
            json!({"results": [{"success": false, "error": "locked"}]}),
        )
        .await;

        let executor = executor_for(&server).await;
        let err = executor.query("Lalice", &lookup()).await.unwrap_err();
        assert!(matches!(err, TableError::Remote { .. }));
        assert!(err.to_string().contains("locked"));
    }

    #[tokio::test]
    async fn test_query_unsupported_cell_rejected() {
        let server = MockServer::start().await;
        respond(
            &server,
            json!({"results": [{"success": true, "resultSet": [{"v": true}]}]}),
        )
        .await;

        let executor = executor_for(&server).await;
        let err = executor.query("Lalice", &lookup()).await.unwrap_err();
        assert!(err.to_string().contains("boolean"));
    }

    #[tokio::test]
    async fn test_exec_returns_counts_in_order() {
        let server = MockServer::start().await;
        respond(
            &server,
            json!({
                "results": [
                    {"success": true, "rowsUpdated": 0},
                    {"success": true, "rowsUpdated": 5}
                ]
            }),
        )
        .await;

        let executor = executor_for(&server).await;
        let counts = executor.exec(&update()).await.unwrap();
        assert_eq!(counts, vec![0, 5]);
    }

    #[tokio::test]
    async fn test_exec_missing_count_rejected() {
        let server = MockServer::start().await;
        respond(&server, json!({"results": [{"success": true}]})).await;

        let executor = executor_for(&server).await;
        let err = executor.exec(&update()).await.unwrap_err();
        assert!(matches!(err, TableError::Remote { .. }));
        assert!(err.to_string().contains("affected-row count"));
    }

    #[tokio::test]
    async fn test_close_releases_connection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"results": [{"success": true, "resultSet": [{"v": "x"}]}]}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let executor = executor_for(&server).await;
        executor.query("Lalice", &lookup()).await.unwrap();

        // Close is idempotent; calls after it fail without a round-trip.
        executor.close();
        executor.close();
        let err = executor.query("Lalice", &lookup()).await.unwrap_err();
        assert!(matches!(err, TableError::Backend { .. }));
        assert!(err.to_string().contains("released"));
    }
}
