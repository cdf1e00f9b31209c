//! Order synchronization engine
//!
//! This module turns a customer's remote order history into the local product
//! frequency map, one order per invocation, with rate limiting, retries and
//! cooperative cancellation.
//!
//! # Components
//!
//! - [`ratelimit`]: Sliding-window limiter shared by every remote call
//! - [`retry`]: Retry manager with exponential backoff for transient failures
//! - [`api`]: The [`OrderApi`] seam and the guarded call path
//! - [`http_client`]: `reqwest`-backed [`OrderApi`]
//! - [`catalog`]: Cache-first, cursor-paginated order list
//! - [`aggregator`]: Folds order lines into the product map
//! - [`coordinator`]: The single-flight sync state machine
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use order_sync::config::Config;
//! use order_sync::storage::FilesystemStore;
//! use order_sync::sync::{HttpOrderApi, OrderSyncCoordinator};
//!
//! let config = Config::from_file("config.yaml")?;
//! let api = Arc::new(HttpOrderApi::new(&config.api)?);
//! let store = Arc::new(FilesystemStore::new(&config.storage.data_dir));
//! let coordinator = OrderSyncCoordinator::from_config(&config, api, store);
//!
//! if let Some(state) = coordinator.start().await {
//!     println!("{:?}", state);
//! }
//! ```

pub mod aggregator;
pub mod api;
pub mod catalog;
pub mod coordinator;
pub mod http_client;
pub mod ratelimit;
pub mod retry;

// Re-export main types for convenience
pub use aggregator::{top_products, ProductAggregator};
pub use api::{GuardedApi, OrderApi};
pub use catalog::OrderCatalogFetcher;
pub use coordinator::{OrderSyncCoordinator, SyncOptions};
pub use http_client::HttpOrderApi;
pub use ratelimit::RateLimiter;
pub use retry::RetryManager;
