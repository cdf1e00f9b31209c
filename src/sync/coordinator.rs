//! Order sync coordinator
//!
//! Drives one sync invocation at a time through its states:
//!
//! ```text
//! Idle -> FetchingOrders -> Processing -> Completed
//!                 |              |
//!                 +--------------+-> Cancelled | Error
//! ```
//!
//! Each invocation resolves the order catalog, picks the first order that is
//! not yet in the processed set, folds its lines into the product map and
//! commits the map together with the updated processed set. Exactly one order
//! is handled per invocation; the completed state reports how many are left.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{EngineError, ErrorKind};
use crate::models::{Order, SyncState, SyncStats};
use crate::storage::StateStore;

use super::aggregator::{products_found, ProductAggregator};
use super::api::{check_cancelled, GuardedApi, OrderApi};
use super::catalog::OrderCatalogFetcher;
use super::ratelimit::RateLimiter;
use super::retry::RetryManager;

/// Capacity of the transition channel
const EVENT_CAPACITY: usize = 64;

/// Options for a single sync invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Ignore the cached order list and download it again
    pub refresh_catalog: bool,
}

/// Clears the running flag when a run ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight, cancellable order sync state machine
///
/// Construct once and share behind an `Arc`. Transitions are published on a
/// broadcast channel (every state, in order) and a watch channel (latest
/// state only).
pub struct OrderSyncCoordinator {
    customer_id: String,
    catalog: OrderCatalogFetcher,
    api: GuardedApi,
    store: Arc<dyn StateStore>,
    aggregator: ProductAggregator,
    events: broadcast::Sender<SyncState>,
    latest: watch::Sender<SyncState>,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl OrderSyncCoordinator {
    /// Create a coordinator for one customer
    pub fn new(
        customer_id: impl Into<String>,
        api: GuardedApi,
        store: Arc<dyn StateStore>,
        max_pages: usize,
    ) -> Self {
        let catalog = OrderCatalogFetcher::new(api.clone(), store.clone(), max_pages);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (latest, _) = watch::channel(SyncState::Idle);

        Self {
            customer_id: customer_id.into(),
            catalog,
            api,
            store,
            aggregator: ProductAggregator,
            events,
            latest,
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Create a coordinator with the limiter and retry policy from configuration
    pub fn from_config(config: &Config, api: Arc<dyn OrderApi>, store: Arc<dyn StateStore>) -> Self {
        let guarded = GuardedApi::new(
            api,
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            RetryManager::new(config.retry.clone()),
        );
        Self::new(
            config.customer_id.clone(),
            guarded,
            store,
            config.catalog.max_pages,
        )
    }

    /// Customer this coordinator syncs
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    /// Receive every state transition in order
    pub fn subscribe(&self) -> broadcast::Receiver<SyncState> {
        self.events.subscribe()
    }

    /// Observe the latest state
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.latest.subscribe()
    }

    /// Snapshot of the latest state
    pub fn state(&self) -> SyncState {
        self.latest.borrow().clone()
    }

    /// Whether a run is in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one sync invocation using the cached order list when available
    ///
    /// Returns the terminal state, or `None` without side effects if a run is
    /// already in flight.
    pub async fn start(&self) -> Option<SyncState> {
        self.start_with(SyncOptions::default()).await
    }

    /// Run one sync invocation with explicit options
    pub async fn start_with(&self, options: SyncOptions) -> Option<SyncState> {
        // Run flag and token change together under the lock `cancel()` takes
        let (_guard, cancel) = {
            let mut slot = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(guard) = RunGuard::acquire(&self.running) else {
                debug!(customer_id = %self.customer_id, "Sync already running, ignoring start");
                return None;
            };
            let cancel = CancellationToken::new();
            *slot = cancel.clone();
            (guard, cancel)
        };

        info!(
            customer_id = %self.customer_id,
            refresh_catalog = options.refresh_catalog,
            "Starting order sync"
        );
        self.transition(SyncState::FetchingOrders);

        let terminal = match self.run(options, &cancel).await {
            Ok(stats) => {
                info!(
                    customer_id = %self.customer_id,
                    products_before = stats.products_before,
                    products_found = stats.products_found,
                    products_added = stats.products_added,
                    remaining = stats.remaining_orders,
                    "Order sync completed"
                );
                SyncState::Completed { stats }
            }
            Err(EngineError::Cancelled) => {
                info!(customer_id = %self.customer_id, "Order sync cancelled");
                SyncState::Cancelled
            }
            Err(e) => {
                let kind = e.kind();
                if kind == ErrorKind::Storage {
                    error!(customer_id = %self.customer_id, error = %e, "Order sync failed");
                } else {
                    warn!(customer_id = %self.customer_id, error = %e, "Order sync failed");
                }
                SyncState::Error {
                    kind,
                    message: e.user_message(),
                }
            }
        };

        self.transition(terminal.clone());
        Some(terminal)
    }

    /// Request cancellation of the in-flight run
    ///
    /// Takes effect at the run's next suspension point. Does nothing when idle.
    pub fn cancel(&self) {
        let token = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_running() {
            token.cancel();
        }
    }

    /// Repeat invocations until no unprocessed order remains
    ///
    /// Stops early on a cancelled or failed run, after `max_runs` invocations,
    /// or when a run is already in flight. Returns the last terminal state.
    pub async fn run_until_complete(&self, max_runs: Option<usize>) -> Option<SyncState> {
        self.run_until_complete_with(SyncOptions::default(), max_runs)
            .await
    }

    /// Repeat invocations, applying `options` to the first one only
    pub async fn run_until_complete_with(
        &self,
        options: SyncOptions,
        max_runs: Option<usize>,
    ) -> Option<SyncState> {
        let mut last = None;
        let mut runs = 0usize;
        let mut options = options;

        while max_runs.map_or(true, |max| runs < max) {
            let state = self.start_with(options).await?;
            options = SyncOptions::default();
            runs += 1;

            let done = !matches!(
                &state,
                SyncState::Completed { stats } if stats.remaining_orders > 0
            );
            last = Some(state);
            if done {
                break;
            }
        }

        last
    }

    async fn run(
        &self,
        options: SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncStats, EngineError> {
        let orders = self
            .catalog
            .get_orders(&self.customer_id, !options.refresh_catalog, cancel)
            .await?;

        check_cancelled(cancel)?;
        let mut processed = self.store.load_processed().await?;
        let products = self.store.load_products().await?;
        let products_before = products.len();

        let unprocessed = unprocessed_orders(&orders, |id| processed.contains(id));
        let Some(order) = unprocessed.first().copied() else {
            info!(
                customer_id = %self.customer_id,
                orders = orders.len(),
                "All orders already processed"
            );
            return Ok(SyncStats::default());
        };
        let remaining = unprocessed.len() - 1;

        self.transition(SyncState::Processing {
            order_id: order.id.clone(),
            remaining,
        });

        let detail = self
            .api
            .fetch_order_lines(&self.customer_id, &order.id, &order.warehouse, cancel)
            .await?;

        let found = products_found(&detail.lines);
        let products = if detail.lines.is_empty() {
            debug!(order_id = %order.id, "Order has no lines");
            products
        } else {
            self.aggregator
                .merge(products, &detail.lines, detail.order_timestamp)
        };
        let products_added = products.len().saturating_sub(products_before);
        processed.insert(order.id.clone(), Utc::now());

        check_cancelled(cancel)?;
        self.store.commit(&products, &processed).await?;

        debug!(
            order_id = %order.id,
            lines = detail.lines.len(),
            products = products.len(),
            "Order committed"
        );

        Ok(SyncStats {
            products_before,
            products_found: found,
            products_added,
            remaining_orders: remaining,
        })
    }

    fn transition(&self, state: SyncState) {
        debug!(customer_id = %self.customer_id, state = ?state, "Sync state changed");
        // No subscribers is fine
        let _ = self.events.send(state.clone());
        self.latest.send_replace(state);
    }
}

/// Orders not yet processed, in server order, each id once
fn unprocessed_orders<'a>(orders: &'a [Order], is_processed: impl Fn(&str) -> bool) -> Vec<&'a Order> {
    let mut seen = HashSet::new();
    orders
        .iter()
        .filter(|order| !is_processed(&order.id))
        .filter(|order| seen.insert(order.id.as_str()))
        .collect()
}
