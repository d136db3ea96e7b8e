//! Symbol Search
//!
//! Looks up symbols by free text. Matches come back highlighted with
//! `<em>` tags, which are stripped before the body is parsed.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Production symbol search endpoint.
pub const SEARCH_URL: &str = "https://symbol-search.tradingview.com/symbol_search/";

/// Search failures.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Request could not be sent or the body not read.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("search returned HTTP {0}")]
    Status(u16),

    /// Body was not a JSON list of symbols.
    #[error("failed to parse search results: {0}")]
    JsonParse(String),
}

/// One search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolInfo {
    /// Ticker, e.g. `NIFTY`.
    pub symbol: String,
    /// Human-readable name.
    pub description: String,
    /// Instrument type (`stock`, `futures`, `index`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Listing exchange.
    pub exchange: String,
    /// Quote currency.
    pub currency_code: Option<String>,
    /// Country code.
    pub country: Option<String>,
}

impl SymbolInfo {
    /// `EXCHANGE:SYMBOL` form accepted by the chart session.
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.exchange, self.symbol)
    }
}

/// Symbol search client.
#[derive(Debug, Clone)]
pub struct SymbolSearch {
    client: Client,
    url: String,
}

impl SymbolSearch {
    /// Create a client against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        Self::with_url(SEARCH_URL, timeout)
    }

    /// Create a client against another endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Search for `text`, optionally restricted to one exchange.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, or an
    /// unparsable body.
    pub async fn search(&self, text: &str, exchange: &str) -> Result<Vec<SymbolInfo>, SearchError> {
        let query = [
            ("text", text),
            ("hl", "1"),
            ("exchange", exchange),
            ("lang", "en"),
            ("type", ""),
            ("domain", "production"),
        ];

        let response = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        let results = parse_results(&body)?;
        tracing::debug!(text, exchange, hits = results.len(), "Symbol search");
        Ok(results)
    }
}

fn parse_results(body: &str) -> Result<Vec<SymbolInfo>, SearchError> {
    let cleaned = body.replace("<em>", "").replace("</em>", "");
    serde_json::from_str(&cleaned).map_err(|e| SearchError::JsonParse(e.to_string()))
}
