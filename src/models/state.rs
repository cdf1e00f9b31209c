//! Observable sync state

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Outcome figures of a single sync invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Products in the aggregate before this run
    pub products_before: usize,
    /// Distinct products referenced by the processed order
    pub products_found: usize,
    /// Products that were new to the aggregate
    pub products_added: usize,
    /// Unprocessed orders left after this run
    pub remaining_orders: usize,
}

/// State of the order sync coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    /// Nothing running
    Idle,
    /// Resolving the order catalog
    FetchingOrders,
    /// Working on one order
    Processing {
        /// Order being processed
        order_id: String,
        /// Unprocessed orders after this one
        remaining: usize,
    },
    /// Run finished
    Completed {
        /// Figures for the run
        stats: SyncStats,
    },
    /// Run stopped by the caller
    Cancelled,
    /// Run aborted
    Error {
        /// Failure classification
        kind: ErrorKind,
        /// User-facing message naming the failure kind
        message: String,
    },
}

impl SyncState {
    /// Whether this state ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Completed { .. } | SyncState::Cancelled | SyncState::Error { .. }
        )
    }

    /// Stats of a completed run
    pub fn stats(&self) -> Option<SyncStats> {
        match self {
            SyncState::Completed { stats } => Some(*stats),
            _ => None,
        }
    }
}
