//! HTTP implementation of the order API
//!
//! Talks JSON over HTTPS to the order service. Rate limiting and retries are
//! not handled here; callers go through [`GuardedApi`](super::api::GuardedApi).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::SyncError;
use crate::models::{OrderDetail, OrderPage};

use super::api::OrderApi;

/// Longest response body excerpt kept in an API error
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Order API client over HTTP
#[derive(Debug, Clone)]
pub struct HttpOrderApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpOrderApi {
    /// Create a client from configuration
    pub fn new(config: &ApiConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("order-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Self::with_client(client, config)
    }

    /// Create a client around a preconfigured reqwest `Client`
    pub fn with_client(client: Client, config: &ApiConfig) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            SyncError::InvalidData(format!("invalid base URL {}: {}", config.base_url, e))
        })?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Base URL of the order service
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidData(format!("base URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, SyncError> {
        let mut request = self.client.get(url.clone());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(url = %url, "Sending order API request");

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = status.as_u16(), "Order API returned an error");
            return Err(SyncError::Api {
                status: status.as_u16(),
                message: truncate(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(url = %url, body_size = body.len(), "Received order API response");

        serde_json::from_slice(&body)
            .map_err(|e| SyncError::InvalidData(format!("undecodable response from {}: {}", url.path(), e)))
    }
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn fetch_orders(
        &self,
        customer_id: &str,
        page: Option<String>,
    ) -> Result<OrderPage, SyncError> {
        let url = self.endpoint(&["customers", customer_id, "orders"])?;
        match page.as_deref() {
            Some(cursor) => self.get_json(url, &[("page", cursor)]).await,
            None => self.get_json(url, &[]).await,
        }
    }

    async fn fetch_order_lines(
        &self,
        customer_id: &str,
        order_id: &str,
        warehouse: &str,
    ) -> Result<OrderDetail, SyncError> {
        let url = self.endpoint(&["customers", customer_id, "orders", order_id, "lines"])?;
        self.get_json(url, &[("warehouse", warehouse)]).await
    }
}

fn map_transport_error(e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::NetworkTimeout
    } else if e.is_connect() {
        SyncError::ConnectionRefused
    } else {
        SyncError::Network(e.to_string())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
