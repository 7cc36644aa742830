//! # wardflow-storage
//!
//! Storage abstraction layer for WardFlow.
//!
//! This crate defines the contracts of the Bed Registry and Encounter Ledger
//! and the transaction through which the flow orchestrator mutates both in one
//! atomic unit. Implementations live in separate crates.
//!
//! ## Overview
//!
//! - [`BedRegistry`]: ward and bed setup, bed lookups, direct status toggles.
//! - [`EncounterLedger`]: read side of the admission records.
//! - [`FlowStore`]: both of the above plus [`FlowStore::begin_transaction`].
//! - [`FlowTransaction`]: row locks, staged writes, commit/rollback.
//!
//! ## Example
//!
//! ```ignore
//! use wardflow_core::BedStatus;
//! use wardflow_storage::{FlowStore, LockKey};
//!
//! let mut tx = store.begin_transaction().await?;
//! tx.lock_all(vec![LockKey::patient(&patient), LockKey::bed(&bed)]).await?;
//! tx.set_bed_status(&bed, BedStatus::OCCUPIED, admitted_at)?;
//! tx.create_encounter(&patient, &bed, admitted_at, metadata)?;
//! tx.commit().await?;
//! ```

mod error;
mod traits;
mod types;

pub use error::StorageError;
pub use traits::{BedRegistry, EncounterLedger, FlowStore, FlowTransaction};
pub use types::{BedFilter, LockKey, TransactionState, TransactionStats};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable store trait object.
pub type DynFlowStore = std::sync::Arc<dyn FlowStore>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::StorageError;
    pub use crate::traits::{BedRegistry, EncounterLedger, FlowStore, FlowTransaction};
    pub use crate::types::{BedFilter, LockKey, TransactionState, TransactionStats};
    pub use crate::{DynFlowStore, StorageResult};
}
