//! Persistence contract for the sync engine
//!
//! A [`StateStore`] holds three things per installation: the cached order
//! list of each customer, the product map, and the processed-order set. The
//! last two always change together through [`StateStore::commit`].

use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::{OrderSnapshot, ProcessedOrderSet, ProductMap};

/// Trait for state stores
///
/// Implementations must make `commit` all-or-nothing: after a crash a reader
/// sees either the previous product map and processed set or the new pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the name of this store
    fn name(&self) -> &str;

    /// Loads the cached order list for a customer
    ///
    /// Returns `Ok(None)` if nothing has been cached yet.
    async fn load_orders(&self, customer_id: &str) -> Result<Option<OrderSnapshot>, StorageError>;

    /// Replaces the cached order list for `snapshot.customer_id`
    async fn save_orders(&self, snapshot: &OrderSnapshot) -> Result<(), StorageError>;

    /// Loads the processed-order set, empty if none was committed
    async fn load_processed(&self) -> Result<ProcessedOrderSet, StorageError>;

    /// Loads the product map, empty if none was committed
    async fn load_products(&self) -> Result<ProductMap, StorageError>;

    /// Atomically replaces the product map and the processed-order set
    async fn commit(
        &self,
        products: &ProductMap,
        processed: &ProcessedOrderSet,
    ) -> Result<(), StorageError>;

    /// Clears the product map and processed set, keeping cached order lists
    async fn reset(&self) -> Result<(), StorageError>;
}
