//! REST quote client
//!
//! One HTTP GET per instrument. The vendor encodes every numeric field as
//! a string, and the HTTP status plus the vendor result code must both be
//! validated before the payload is trusted.

use crate::auth::TokenProvider;
use crate::feed::{FeedError, PollSource, PriceTick, Source};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Quote client configuration
#[derive(Debug, Clone)]
pub struct QuoteClientConfig {
    /// API base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl QuoteClientConfig {
    /// Create a config for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    rt_cd: String,
    #[serde(default)]
    msg1: String,
    output: Option<QuoteOutput>,
}

#[derive(Debug, Deserialize)]
struct QuoteOutput {
    price: String,
    change: String,
    change_rate: String,
    volume: String,
    value: String,
    high: String,
    low: String,
    open: String,
    prev_close: String,
}

/// Pull-feed adapter over the vendor quote endpoint
pub struct QuoteClient {
    config: QuoteClientConfig,
    client: Client,
    tokens: Arc<dyn TokenProvider>,
    source: Source,
}

impl QuoteClient {
    /// Create an adapter for the primary pull feed
    pub fn new(config: QuoteClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, FeedError> {
        Self::with_source(config, tokens, Source::Pull)
    }

    /// Create an adapter reporting a specific source (e.g. the backup feed)
    pub fn with_source(
        config: QuoteClientConfig,
        tokens: Arc<dyn TokenProvider>,
        source: Source,
    ) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(Self {
            config,
            client,
            tokens,
            source,
        })
    }

    /// Parse a vendor response body into a tick
    fn parse_quote(code: &str, body: &str, source: Source) -> Result<PriceTick, FeedError> {
        let response: QuoteResponse =
            serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;

        if response.rt_cd != "0" {
            return Err(FeedError::Malformed(format!(
                "vendor result {}: {}",
                response.rt_cd, response.msg1
            )));
        }
        let output = response
            .output
            .ok_or_else(|| FeedError::Malformed("missing output block".into()))?;

        Ok(PriceTick {
            code: code.to_string(),
            price: parse_decimal(&output.price, "price")?,
            change: parse_decimal(&output.change, "change")?,
            change_rate: parse_decimal(&output.change_rate, "change_rate")?,
            volume: output
                .volume
                .parse()
                .map_err(|_| FeedError::Malformed("volume not numeric".into()))?,
            value: parse_decimal(&output.value, "value")?,
            high: parse_decimal(&output.high, "high")?,
            low: parse_decimal(&output.low, "low")?,
            open: parse_decimal(&output.open, "open")?,
            prev_close: parse_decimal(&output.prev_close, "prev_close")?,
            timestamp: Utc::now(),
            source,
            stale: false,
        })
    }
}

fn parse_decimal(raw: &str, what: &str) -> Result<Decimal, FeedError> {
    Decimal::from_str(raw).map_err(|_| FeedError::Malformed(format!("{what} not numeric: {raw}")))
}

#[async_trait]
impl PollSource for QuoteClient {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, code: &str) -> Result<PriceTick, FeedError> {
        let url = format!("{}/quotations/price", self.config.base_url);
        let token = self
            .tokens
            .credential()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("code", code)])
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Self::parse_quote(code, &body, self.source)
    }
}
