//! Remote order API contract and the guarded call path
//!
//! [`OrderApi`] is the seam to the order service. [`GuardedApi`] is the only
//! way the engine talks to it: every attempt waits on the shared
//! [`RateLimiter`], transient failures go through the [`RetryManager`], and the
//! whole call races the run's cancellation token.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, SyncError};
use crate::models::{OrderDetail, OrderPage};

use super::ratelimit::RateLimiter;
use super::retry::RetryManager;

/// Remote order service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Fetch one page of the customer's order list
    ///
    /// `page` is the cursor returned by the previous page, `None` for the first page.
    async fn fetch_orders(
        &self,
        customer_id: &str,
        page: Option<String>,
    ) -> Result<OrderPage, SyncError>;

    /// Fetch the line items of one order
    async fn fetch_order_lines(
        &self,
        customer_id: &str,
        order_id: &str,
        warehouse: &str,
    ) -> Result<OrderDetail, SyncError>;
}

/// Rate-limited, retried, cancellable access to an [`OrderApi`]
#[derive(Clone)]
pub struct GuardedApi {
    api: Arc<dyn OrderApi>,
    limiter: Arc<RateLimiter>,
    retry: RetryManager,
}

impl GuardedApi {
    /// Wrap an API client
    pub fn new(api: Arc<dyn OrderApi>, limiter: Arc<RateLimiter>, retry: RetryManager) -> Self {
        Self {
            api,
            limiter,
            retry,
        }
    }

    /// Shared rate limiter
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetch one page of the order list
    pub async fn fetch_orders(
        &self,
        customer_id: &str,
        page: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<OrderPage, EngineError> {
        self.call(cancel, || {
            self.api
                .fetch_orders(customer_id, page.map(str::to_string))
        })
        .await
    }

    /// Fetch the line items of one order
    pub async fn fetch_order_lines(
        &self,
        customer_id: &str,
        order_id: &str,
        warehouse: &str,
        cancel: &CancellationToken,
    ) -> Result<OrderDetail, EngineError> {
        self.call(cancel, || {
            self.api.fetch_order_lines(customer_id, order_id, warehouse)
        })
        .await
    }

    async fn call<T, F, Fut>(&self, cancel: &CancellationToken, operation: F) -> Result<T, EngineError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        check_cancelled(cancel)?;

        let operation = &operation;
        let attempts = self.retry.execute(|| async move {
            self.limiter.acquire().await;
            operation().await
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            result = attempts => result.map_err(EngineError::from),
        }
    }
}

/// Fail with [`EngineError::Cancelled`] once the token has fired
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<(), EngineError> {
    if cancel.is_cancelled() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}
