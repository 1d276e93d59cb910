use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::{CurrentCollection, ExchangeRate};
use crate::utils::cache::Cache;

pub mod types;

use types::{CurrentCollectionResponse, RateResponse};

/// Every rate the backend serves is expressed in ALGO.
pub const ALGO: &str = "ALGO";

const CURRENT_COLLECTION_PATH: &str = "/api/user/current-collection";

/// Source of `base` → ALGO rates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rate(&self, base: &str) -> Result<ExchangeRate>;

    /// Fetches past any cached value.
    async fn refresh_rate(&self, base: &str) -> Result<ExchangeRate> {
        self.fetch_rate(base).await
    }
}

/// Source of the signed-in user's current collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CollectionSource: Send + Sync {
    async fn current_collection(&self) -> Result<Option<CurrentCollection>>;
}

/// JSON client for the marketplace backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!("Request to {} failed with status {}", url, status);
            return Err(Error::ApiStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RateSource for ApiClient {
    async fn fetch_rate(&self, base: &str) -> Result<ExchangeRate> {
        let path = format!("/api/currency/rate/{}", base.to_uppercase());
        let response: RateResponse = self.get_json(&path).await?;
        response.into_exchange_rate(base, ALGO)
    }
}

#[async_trait]
impl CollectionSource for ApiClient {
    async fn current_collection(&self) -> Result<Option<CurrentCollection>> {
        let response: CurrentCollectionResponse = self.get_json(CURRENT_COLLECTION_PATH).await?;
        Ok(response.collection)
    }
}

/// Serves rates from a TTL cache, falling through to `inner` on a miss.
/// Failures are never cached.
pub struct CachedRateSource<S> {
    inner: S,
    cache: Cache<ExchangeRate>,
}

impl<S: RateSource> CachedRateSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::new(ttl),
        }
    }
}

#[async_trait]
impl<S: RateSource> RateSource for CachedRateSource<S> {
    async fn fetch_rate(&self, base: &str) -> Result<ExchangeRate> {
        let key = base.to_uppercase();
        if let Some(rate) = self.cache.get(&key).await {
            debug!("Rate cache hit for {}", key);
            return Ok(rate);
        }

        let rate = self.inner.fetch_rate(base).await?;
        self.cache.set(key, rate.clone()).await;
        Ok(rate)
    }

    async fn refresh_rate(&self, base: &str) -> Result<ExchangeRate> {
        let key = base.to_uppercase();
        self.cache.invalidate(&key).await;

        let rate = self.inner.refresh_rate(base).await?;
        self.cache.set(key, rate.clone()).await;
        Ok(rate)
    }
}
