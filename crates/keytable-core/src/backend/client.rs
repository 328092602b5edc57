//! HTTP client for a ws4sql backend endpoint.
//!
//! The whole protocol is one route: POST the transaction document at the
//! database URL, read back per-item results. There is no session state and
//! no retry logic; callers see exactly one round-trip per request.

use reqwest::Client;
use tracing::debug;
use url::Url;

use super::wire::{ErrorBody, Request, Response};
use crate::config::NetworkConfig;
use crate::error::{Result, TableError};

const USER_AGENT: &str = concat!("keytable/", env!("CARGO_PKG_VERSION"));

/// Client bound to a single ws4sql database endpoint.
#[derive(Debug, Clone)]
pub struct Ws4sqlClient {
    endpoint: Url,
    http: Client,
}

impl Ws4sqlClient {
    /// Build a client for the database at `url`.
    pub fn new(url: &str) -> Result<Self> {
        let endpoint = Url::parse(url).map_err(|err| TableError::Config {
            message: format!("invalid backend url '{}': {}", url, err),
        })?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .build()
            .map_err(|err| TableError::Backend {
                message: format!("failed to build HTTP client: {}", err),
                source: Some(err),
            })?;
        Ok(Self { endpoint, http })
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST one transaction and return the per-item results.
    ///
    /// Non-2xx responses carrying a ws4sql error document surface as
    /// [`TableError::Remote`]; transport failures and unintelligible bodies
    /// surface as [`TableError::Backend`].
    pub async fn send(&self, request: &Request) -> Result<Response> {
        debug!(
            "Sending {} item transaction to {}",
            request.transaction.len(),
            self.endpoint
        );
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|err| TableError::Backend {
                message: format!("POST {} failed: {}", self.endpoint, err),
                source: Some(err),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|err| TableError::Backend {
                message: format!("failed to read error response body: {}", err),
                source: Some(err),
            })?;
            return Err(Self::remote_error(status, &body));
        }

        response
            .json::<Response>()
            .await
            .map_err(|err| TableError::Backend {
                message: format!("malformed response from {}: {}", self.endpoint, err),
                source: Some(err),
            })
    }

    fn remote_error(status: reqwest::StatusCode, body: &str) -> TableError {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) if !parsed.error.is_empty() => {
                let message = match parsed.req_idx {
                    Some(idx) if idx >= 0 => {
                        format!("transaction item {} failed: {}", idx, parsed.error)
                    }
                    _ => parsed.error,
                };
                TableError::Remote { message }
            }
            _ => TableError::Backend {
                message: format!("backend returned {}", status),
                source: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::wire::RequestBuilder;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup_request() -> Request {
        RequestBuilder::new()
            .add_query("SELECT v FROM kv WHERE k = :key")
            .bind("key", "alice")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mydb"))
            .and(body_partial_json(json!({"transaction": [{"values": {"key": "alice"}}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"success": true, "resultSet": [{"v": "a@example.org"}]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Ws4sqlClient::new(&format!("{}/mydb", server.uri())).unwrap();
        let response = client.send(&lookup_request()).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].success);
    }

    #[tokio::test]
    async fn test_ws4sql_error_body_surfaces_as_remote() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "reqIdx": 0,
                "error": "no such table: kv"
            })))
            .mount(&server)
            .await;

        let client = Ws4sqlClient::new(&format!("{}/mydb", server.uri())).unwrap();
        let err = client.send(&lookup_request()).await.unwrap_err();
        assert!(matches!(err, TableError::Remote { .. }));
        assert!(err.to_string().contains("no such table: kv"));
        assert!(err.to_string().contains("item 0"));
    }

    #[tokio::test]
    async fn test_plain_http_failure_surfaces_as_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = Ws4sqlClient::new(&format!("{}/mydb", server.uri())).unwrap();
        let err = client.send(&lookup_request()).await.unwrap_err();
        assert!(matches!(err, TableError::Backend { .. }));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_malformed_success_body_surfaces_as_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = Ws4sqlClient::new(&format!("{}/mydb", server.uri())).unwrap();
        let err = client.send(&lookup_request()).await.unwrap_err();
        assert!(matches!(err, TableError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_surfaces_as_backend() {
        // Port 1 is never listening.
        let client = Ws4sqlClient::new("http://127.0.0.1:1/mydb").unwrap();
        let err = client.send(&lookup_request()).await.unwrap_err();
        assert!(matches!(err, TableError::Backend { .. }));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = Ws4sqlClient::new("not a url").unwrap_err();
        assert!(matches!(err, TableError::Config { .. }));
    }
}
