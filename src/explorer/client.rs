//! HTTP client for the explorer API.
//!
//! One [`ExplorerClient`] is built from a resolved [`Config`] and reused for
//! every page of a fetch. Each request is a single GET with a fixed
//! per-request timeout; there is no retry.
//!
//! ## Example
//!
//! ```no_run
//! use usdt_reconciliation::config::Config;
//! use usdt_reconciliation::explorer::{ExplorerClient, PageQuery, SortOrder};
//! use usdt_reconciliation::error::ReconResult;
//!
//! # async fn example() -> ReconResult<()> {
//! let config = Config::load()?;
//! let client = ExplorerClient::new(&config)?;
//! let envelope = client
//!     .token_transfers_page(&PageQuery {
//!         page: 1,
//!         offset: 100,
//!         start_block: 0,
//!         end_block: 99_999_999,
//!         sort: SortOrder::Desc,
//!     })
//!     .await?;
//! println!("success: {}", envelope.is_success());
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::error::{ReconError, ReconResult};
use crate::explorer::types::{ApiEnvelope, PageQuery, USDT_CONTRACT};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, instrument};

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the `account/tokentx` endpoint, bound to one API key and chain.
#[derive(Clone)]
pub struct ExplorerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chain_id: u64,
}

impl ExplorerClient {
    /// Create a client from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built
    /// (for example, the TLS backend fails to initialize).
    pub fn new(config: &Config) -> ReconResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ReconError::config("Failed to build HTTP client", Some(Box::new(e))))?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            api_key: config.api_key().to_string(),
            chain_id: config.chain_id(),
        })
    }

    /// Chain id sent with every request.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// API key sent with every request.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Fetch one page of USDT transfers.
    ///
    /// Only transport-level outcomes are interpreted here; the envelope's
    /// `status`/`message` are left for the caller.
    ///
    /// # Errors
    ///
    /// Returns a fetch error if:
    /// - The request fails or times out (no status)
    /// - The response status is not 200 (status and body)
    /// - The body is not a JSON envelope (status 200)
    #[instrument(skip(self), fields(chain_id = self.chain_id, page = query.page))]
    pub async fn token_transfers_page(&self, query: &PageQuery) -> ReconResult<ApiEnvelope> {
        let start = std::time::Instant::now();

        let params = [
            ("module", "account".to_string()),
            ("action", "tokentx".to_string()),
            ("contractaddress", USDT_CONTRACT.to_string()),
            ("chainid", self.chain_id.to_string()),
            ("page", query.page.to_string()),
            ("offset", query.offset.to_string()),
            ("startblock", query.start_block.to_string()),
            ("endblock", query.end_block.to_string()),
            ("sort", query.sort.as_str().to_string()),
            ("apikey", self.api_key.clone()),
        ];

        let response = self
            .http
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ReconError::fetch(None, format!("Request to explorer failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ReconError::fetch(
                Some(status.as_u16()),
                format!("Failed to read response body: {e}"),
            )
        })?;

        if status != StatusCode::OK {
            return Err(ReconError::fetch(Some(status.as_u16()), body));
        }

        let envelope: ApiEnvelope = serde_json::from_str(&body).map_err(|e| {
            ReconError::fetch(Some(status.as_u16()), format!("Invalid JSON payload: {e}"))
        })?;

        debug!(
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Explorer page received"
        );

        Ok(envelope)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::explorer::types::SortOrder;
    use mockito::{Matcher, Server};

    fn query(page: u32) -> PageQuery {
        PageQuery {
            page,
            offset: 100,
            start_block: 0,
            end_block: 99_999_999,
            sort: SortOrder::Desc,
        }
    }

    fn client_for(server: &Server) -> ExplorerClient {
        crate::observability::init_test_tracing();
        let config = Config::new("test-key", 1, format!("{}/v2/api", server.url()));
        ExplorerClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_sends_all_query_parameters() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("module".into(), "account".into()),
                Matcher::UrlEncoded("action".into(), "tokentx".into()),
                Matcher::UrlEncoded("contractaddress".into(), USDT_CONTRACT.into()),
                Matcher::UrlEncoded("chainid".into(), "1".into()),
                Matcher::UrlEncoded("page".into(), "3".into()),
                Matcher::UrlEncoded("offset".into(), "100".into()),
                Matcher::UrlEncoded("startblock".into(), "0".into()),
                Matcher::UrlEncoded("endblock".into(), "99999999".into()),
                Matcher::UrlEncoded("sort".into(), "desc".into()),
                Matcher::UrlEncoded("apikey".into(), "test-key".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"1","message":"OK","result":[]}"#)
            .create_async()
            .await;

        let envelope = client_for(&server).token_transfers_page(&query(3)).await.unwrap();
        assert!(envelope.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_200_carries_status_and_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("Too Many Requests")
            .create_async()
            .await;

        let result = client_for(&server).token_transfers_page(&query(1)).await;
        match result {
            Err(ReconError::FetchError { status, message }) => {
                assert_eq!(status, Some(429));
                assert_eq!(message, "Too Many Requests");
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_fetch_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/api")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("invalid json{]")
            .create_async()
            .await;

        let result = client_for(&server).token_transfers_page(&query(1)).await;
        assert!(matches!(result, Err(ReconError::FetchError { status: Some(200), .. })));
    }

    #[tokio::test]
    async fn test_unreachable_host_has_no_status() {
        let config = Config::new("k", 1, "http://127.0.0.1:1/v2/api");
        let client = ExplorerClient::new(&config).unwrap();

        let result = client.token_transfers_page(&query(1)).await;
        assert!(matches!(result, Err(ReconError::FetchError { status: None, .. })));
    }
}
