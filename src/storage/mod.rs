//! Persistent state for order-sync
//!
//! The default store keeps JSON files in a data directory. An in-memory store
//! is available for embedding and tests.

pub mod traits;

mod filesystem;
mod memory;

pub use traits::StateStore;

#[cfg(test)]
pub use traits::MockStateStore;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
