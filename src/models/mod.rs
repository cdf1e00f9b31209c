//! Domain models for order-sync
//!
//! This module contains the core domain models used throughout the engine.

pub mod order;
pub mod product;
pub mod state;

// Re-export commonly used types
pub use order::{Order, OrderDetail, OrderLine, OrderPage, OrderSnapshot};
pub use product::{ProcessedOrderSet, Product, ProductMap};
pub use state::{SyncState, SyncStats};
