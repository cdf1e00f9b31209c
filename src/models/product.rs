//! Product aggregate and processed-order bookkeeping
//!
//! These are the two pieces of durable progress: the per-product purchase
//! frequency map and the set of orders already folded into it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Purchase statistics for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Number of distinct processed orders containing this product
    pub frequency: u32,

    /// Most recent order timestamp seen for this product
    pub last_purchase: DateTime<Utc>,

    /// Sum of all purchased quantities
    pub total_quantity: f64,

    /// Optional category
    #[serde(default)]
    pub category: Option<String>,
}

/// Product aggregate keyed by product id
pub type ProductMap = BTreeMap<String, Product>;

/// Append-only set of processed order ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedOrderSet {
    ids: BTreeSet<String>,
    last_processed_at: Option<DateTime<Utc>>,
}

impl ProcessedOrderSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the order was already processed
    pub fn contains(&self, order_id: &str) -> bool {
        self.ids.contains(order_id)
    }

    /// Record an order as processed
    ///
    /// Returns `false` and leaves the set untouched if the id is already present.
    pub fn insert(&mut self, order_id: impl Into<String>, at: DateTime<Utc>) -> bool {
        let inserted = self.ids.insert(order_id.into());
        if inserted {
            self.last_processed_at = Some(at);
        }
        inserted
    }

    /// Number of processed orders
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing has been processed yet
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// When the last order was processed
    pub fn last_processed_at(&self) -> Option<DateTime<Utc>> {
        self.last_processed_at
    }

    /// Iterate processed ids in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}
