//! In-memory state store

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::models::{OrderSnapshot, ProcessedOrderSet, ProductMap};

use super::traits::StateStore;

#[derive(Default)]
struct MemoryState {
    orders: HashMap<String, OrderSnapshot>,
    products: ProductMap,
    processed: ProcessedOrderSet,
}

/// State store that keeps everything in process memory
///
/// Nothing survives a restart. Commits are counted so callers can check
/// whether a run persisted anything.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    commits: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `commit` calls
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_orders(&self, customer_id: &str) -> Result<Option<OrderSnapshot>, StorageError> {
        Ok(self.state.read().await.orders.get(customer_id).cloned())
    }

    async fn save_orders(&self, snapshot: &OrderSnapshot) -> Result<(), StorageError> {
        self.state
            .write()
            .await
            .orders
            .insert(snapshot.customer_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load_processed(&self) -> Result<ProcessedOrderSet, StorageError> {
        Ok(self.state.read().await.processed.clone())
    }

    async fn load_products(&self) -> Result<ProductMap, StorageError> {
        Ok(self.state.read().await.products.clone())
    }

    async fn commit(
        &self,
        products: &ProductMap,
        processed: &ProcessedOrderSet,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.products = products.clone();
        state.processed = processed.clone();
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.products.clear();
        state.processed = ProcessedOrderSet::new();
        Ok(())
    }
}
