//! order-sync - Rate-limited, resumable order history synchronization
//!
//! This crate downloads a customer's order history from a remote order
//! service, one order per invocation, and folds the line items into a
//! persistent product-frequency map. Progress survives restarts and every
//! order is counted exactly once.

pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod sync;
pub mod telemetry;
