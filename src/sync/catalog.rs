//! Order catalog resolution
//!
//! Produces the customer's complete order list in server order, either from
//! the cached snapshot or by walking the cursor-paginated remote list.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{EngineError, SyncError};
use crate::models::{Order, OrderSnapshot};
use crate::storage::StateStore;

use super::api::{check_cancelled, GuardedApi};

/// Resolves the full order list for a customer
#[derive(Clone)]
pub struct OrderCatalogFetcher {
    api: GuardedApi,
    store: Arc<dyn StateStore>,
    max_pages: usize,
}

impl OrderCatalogFetcher {
    /// Create a new fetcher
    pub fn new(api: GuardedApi, store: Arc<dyn StateStore>, max_pages: usize) -> Self {
        Self {
            api,
            store,
            max_pages: max_pages.max(1),
        }
    }

    /// Return the customer's orders in server order
    ///
    /// With `prefer_cache` a stored snapshot is returned without touching the
    /// network. Otherwise every page is fetched in sequence and the full list
    /// is stored once the terminal page has arrived.
    pub async fn get_orders(
        &self,
        customer_id: &str,
        prefer_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Order>, EngineError> {
        if prefer_cache {
            check_cancelled(cancel)?;
            if let Some(snapshot) = self.store.load_orders(customer_id).await? {
                debug!(
                    customer_id,
                    orders = snapshot.orders.len(),
                    fetched_at = %snapshot.fetched_at,
                    "Using cached order list"
                );
                return Ok(snapshot.orders);
            }
        }

        let orders = self.fetch_all_pages(customer_id, cancel).await?;

        check_cancelled(cancel)?;
        let snapshot = OrderSnapshot::new(customer_id, orders);
        self.store.save_orders(&snapshot).await?;

        info!(
            customer_id,
            orders = snapshot.orders.len(),
            "Order list downloaded"
        );
        Ok(snapshot.orders)
    }

    async fn fetch_all_pages(
        &self,
        customer_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Order>, EngineError> {
        let mut orders = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        for page_number in 1..=self.max_pages {
            let page = self
                .api
                .fetch_orders(customer_id, cursor.as_deref(), cancel)
                .await?;

            debug!(
                customer_id,
                page = page_number,
                orders = page.orders.len(),
                has_next = page.next_page.is_some(),
                "Fetched order page"
            );
            orders.extend(page.orders);

            match page.next_page {
                None => return Ok(orders),
                Some(next) => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(SyncError::InvalidData(format!(
                            "order list cursor {} repeated",
                            next
                        ))
                        .into());
                    }
                    cursor = Some(next);
                }
            }
        }

        Err(SyncError::InvalidData(format!(
            "order list exceeded {} pages",
            self.max_pages
        ))
        .into())
    }
}
