//! In-memory storage backend for WardFlow.
//!
//! This crate provides an in-memory implementation of the `FlowStore` trait
//! from `wardflow-storage`, using papaya lock-free HashMaps for reads and a
//! table of per-row async mutexes for writes.
//!
//! # Example
//!
//! ```ignore
//! use wardflow_db_memory::InMemoryStore;
//! use wardflow_storage::BedRegistry;
//!
//! let store = InMemoryStore::new();
//! store.register_ward(Ward::new("A", "Acute Medicine")).await?;
//! store.register_bed(Bed::new("A-101", "A", "101", BedType::GENERAL)).await?;
//! ```

pub mod factory;
mod locks;
pub mod storage;
pub mod transaction;

// Re-export the store traits for convenience
pub use wardflow_storage::{BedRegistry, EncounterLedger, FlowStore, StorageError};

pub use factory::{StorageBackend, create_store};
pub use storage::InMemoryStore;
pub use transaction::InMemoryTransaction;
