//! Polygon.io market data gateway.
//!
//! Every request waits on the shared token bucket first. A 429 response is
//! retried after a fixed cooldown (the free tier resets its window roughly
//! every minute), up to `max_retries` attempts. Other non-2xx statuses are
//! returned immediately.

use super::{
    DividendRecord, MarketDataSource, Page, ProviderError, RawBar, SplitRecord, TickerDetails,
    TickerListing,
};
use crate::config::ProviderConfig;
use crate::error::{AppError, AppResult};
use crate::rate_limiter::TokenBucket;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Page size for directory and corporate action listings
const LIST_LIMIT: &str = "1000";

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    results: Option<Vec<T>>,
    next_url: Option<String>,
}

impl<T> ListEnvelope<T> {
    fn into_page(self) -> Page<T> {
        Page {
            results: self.results.unwrap_or_default(),
            next_cursor: cursor_from_next_url(self.next_url.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetailsEnvelope {
    results: Option<TickerDetails>,
}

/// Extract the `cursor` query parameter from a provider `next_url`
pub fn cursor_from_next_url(next_url: Option<&str>) -> Option<String> {
    let url = Url::parse(next_url?).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "cursor")
        .map(|(_, value)| value.into_owned())
        .filter(|cursor| !cursor.is_empty())
}

/// HTTP client for the Polygon REST API
pub struct PolygonClient {
    client: Client,
    base_url: String,
    api_key: String,
    limiter: Arc<TokenBucket>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PolygonClient {
    /// Create a client that shares `limiter` with any other caller of the same API key
    pub fn new(config: &ProviderConfig, limiter: Arc<TokenBucket>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        if config.api_key.is_empty() {
            warn!("POLYGON_API_KEY is empty, provider requests will be rejected");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            limiter,
            max_retries: config.max_retries.max(1),
            retry_backoff: config.retry_backoff(),
        })
    }

    /// Build the client together with its own limiter
    pub fn from_config(config: &ProviderConfig) -> AppResult<Self> {
        let limiter = TokenBucket::new(config.max_tokens, config.refill_rate())
            .map_err(|e| AppError::Config(e.to_string()))?;
        Self::new(config, Arc::new(limiter))
    }

    /// Override the 429 cooldown
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// GET `path` and decode the JSON body, retrying rate-limit rejections.
    ///
    /// `endpoint` is a key-free label used in logs and errors.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);

        for attempt in 1..=self.max_retries {
            self.limiter.acquire().await;

            let response = self
                .client
                .get(&url)
                .query(params)
                .query(&[("apiKey", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| ProviderError::Http {
                    endpoint: endpoint.to_string(),
                    source: e.without_url(),
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(
                    "Rate limited (429) on {}, attempt {}/{}",
                    endpoint, attempt, self.max_retries
                );
                if attempt < self.max_retries {
                    tokio::time::sleep(self.retry_backoff).await;
                }
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(ProviderError::NotFound {
                    endpoint: endpoint.to_string(),
                });
            }

            if !status.is_success() {
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                    endpoint: endpoint.to_string(),
                });
            }

            debug!("{} -> {}", endpoint, status);
            return response.json::<T>().await.map_err(|e| ProviderError::Decode {
                endpoint: endpoint.to_string(),
                message: e.without_url().to_string(),
            });
        }

        Err(ProviderError::RateLimited {
            attempts: self.max_retries,
        })
    }

    async fn list_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &str,
        base_params: &[(&str, &str)],
        cursor: Option<&str>,
    ) -> Result<Page<T>, ProviderError> {
        let mut params = base_params.to_vec();
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        let envelope: ListEnvelope<T> = self.get_json(endpoint, path, &params).await?;
        Ok(envelope.into_page())
    }
}

#[async_trait]
impl MarketDataSource for PolygonClient {
    async fn grouped_daily(&self, date: NaiveDate) -> Result<Vec<RawBar>, ProviderError> {
        let day = date.format("%Y-%m-%d").to_string();
        let path = format!("/v2/aggs/grouped/locale/us/market/stocks/{}", day);
        let envelope: ListEnvelope<RawBar> = self
            .get_json(&format!("grouped_daily/{}", day), &path, &[])
            .await?;
        Ok(envelope.results.unwrap_or_default())
    }

    async fn ticker_details(&self, symbol: &str) -> Result<Option<TickerDetails>, ProviderError> {
        let path = format!("/v3/reference/tickers/{}", symbol);
        match self
            .get_json::<DetailsEnvelope>(&format!("ticker_details/{}", symbol), &path, &[])
            .await
        {
            Ok(envelope) => Ok(envelope.results),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn tickers_list(&self, cursor: Option<&str>) -> Result<Page<TickerListing>, ProviderError> {
        self.list_page(
            "tickers_list",
            "/v3/reference/tickers",
            &[("market", "stocks"), ("active", "true"), ("limit", LIST_LIMIT)],
            cursor,
        )
        .await
    }

    async fn aggregate_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawBar>, ProviderError> {
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        let path = format!("/v2/aggs/ticker/{}/range/1/day/{}/{}", symbol, from, to);
        let envelope: ListEnvelope<RawBar> = self
            .get_json(&format!("aggregate_bars/{}", symbol), &path, &[])
            .await?;
        Ok(envelope.results.unwrap_or_default())
    }

    async fn dividends(&self, cursor: Option<&str>) -> Result<Page<DividendRecord>, ProviderError> {
        self.list_page(
            "dividends",
            "/v3/reference/dividends",
            &[("limit", LIST_LIMIT), ("order", "asc")],
            cursor,
        )
        .await
    }

    async fn splits(&self, cursor: Option<&str>) -> Result<Page<SplitRecord>, ProviderError> {
        self.list_page(
            "splits",
            "/v3/reference/splits",
            &[("limit", LIST_LIMIT), ("order", "asc")],
            cursor,
        )
        .await
    }
}
