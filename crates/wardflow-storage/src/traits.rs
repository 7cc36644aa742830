//! Storage traits for the bed registry and encounter ledger.

use async_trait::async_trait;
use serde_json::Value;
use wardflow_core::{
    Bed, BedId, BedStatus, DischargeMetadata, Encounter, EncounterId, PatientId, Timestamp, Ward,
    WardId,
};

use crate::StorageResult;
use crate::types::{BedFilter, LockKey, TransactionStats};

/// Authoritative store of wards, beds and bed status.
#[async_trait]
pub trait BedRegistry: Send + Sync {
    // ==================== Ward setup ====================

    /// Registers a ward.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the ward id is taken.
    async fn register_ward(&self, ward: Ward) -> StorageResult<Ward>;

    /// Registers a bed in an existing ward.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown ward,
    /// `StorageError::AlreadyExists` for a duplicate bed id or a bed number
    /// already used in the ward, `StorageError::InvalidVocabulary` for an
    /// unknown type or status and `StorageError::InvalidTransition` for a bed
    /// registered as `occupied`.
    async fn register_bed(&self, bed: Bed) -> StorageResult<Bed>;

    async fn get_ward(&self, id: &WardId) -> StorageResult<Ward>;

    /// All wards ordered by id.
    async fn list_wards(&self) -> StorageResult<Vec<Ward>>;

    // ==================== Beds ====================

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the bed does not exist.
    async fn get_bed(&self, id: &BedId) -> StorageResult<Bed>;

    /// Beds matching `filter`, ordered by ward then bed number.
    async fn list_beds(&self, filter: &BedFilter) -> StorageResult<Vec<Bed>>;

    /// Moves a bed between non-occupied statuses.
    ///
    /// This is the only mutator exposed outside the flow orchestrator.
    /// Setting the current status again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidTransition` when either the current or
    /// the requested status is `occupied`.
    async fn set_status(&self, id: &BedId, status: BedStatus) -> StorageResult<Bed>;
}

/// Read side of the admission records.
///
/// Writes go through [`FlowTransaction`] only. Reads are read-committed and
/// not a snapshot across both tables: while a commit is being applied, an
/// encounter read here may already be closed or repointed while
/// [`BedRegistry::get_bed`] still returns the old bed status, or the reverse.
/// Callers that need both sides consistent read them inside a transaction
/// holding the bed lock.
#[async_trait]
pub trait EncounterLedger: Send + Sync {
    async fn get_encounter(&self, id: &EncounterId) -> StorageResult<Encounter>;

    async fn open_encounter_for_patient(
        &self,
        patient_id: &PatientId,
    ) -> StorageResult<Option<Encounter>>;

    async fn open_encounter_for_bed(&self, bed_id: &BedId) -> StorageResult<Option<Encounter>>;

    /// Every encounter of the patient, oldest admission first.
    async fn encounters_for_patient(&self, patient_id: &PatientId)
    -> StorageResult<Vec<Encounter>>;
}

/// A store holding both the bed registry and the encounter ledger.
#[async_trait]
pub trait FlowStore: BedRegistry + EncounterLedger {
    /// Begins a new transaction with no locks held.
    async fn begin_transaction(&self) -> StorageResult<Box<dyn FlowTransaction>>;

    fn transaction_stats(&self) -> TransactionStats;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// An atomic unit of work across beds and encounters.
///
/// Locks are taken explicitly and held until the transaction ends. Writes
/// are staged and become visible only on [`FlowTransaction::commit`]; a
/// transaction dropped without commit applies nothing.
///
/// Reads inside the transaction see staged writes first. Every write requires
/// the lock of the row it touches.
#[async_trait]
pub trait FlowTransaction: Send {
    /// Acquires a row lock, waiting for the current holder.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` when `key` orders before a lock
    /// already held.
    async fn lock(&mut self, key: LockKey) -> StorageResult<()>;

    /// Acquires several row locks in ascending order.
    async fn lock_all(&mut self, keys: Vec<LockKey>) -> StorageResult<()>;

    fn bed(&self, id: &BedId) -> StorageResult<Bed>;

    fn encounter(&self, id: &EncounterId) -> StorageResult<Encounter>;

    fn open_encounter_for_patient(&self, patient_id: &PatientId)
    -> StorageResult<Option<Encounter>>;

    /// Stages a status change, including into and out of `occupied`.
    fn set_bed_status(&mut self, id: &BedId, status: BedStatus, at: Timestamp)
    -> StorageResult<Bed>;

    /// Stages a new open encounter.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DuplicateAdmission` if the patient already has
    /// an open encounter.
    fn create_encounter(
        &mut self,
        patient_id: &PatientId,
        bed_id: &BedId,
        admitted_at: Timestamp,
        clinical_metadata: Value,
    ) -> StorageResult<Encounter>;

    /// Stages closing an encounter; the bed reference is kept as history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::EncounterNotOpen` for a discharged encounter.
    fn close_encounter(
        &mut self,
        id: &EncounterId,
        discharged_at: Timestamp,
        metadata: DischargeMetadata,
    ) -> StorageResult<Encounter>;

    /// Stages moving an encounter to another bed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::EncounterNotOpen` for a discharged encounter.
    fn repoint_encounter(
        &mut self,
        id: &EncounterId,
        new_bed_id: &BedId,
        reason: String,
        at: Timestamp,
    ) -> StorageResult<Encounter>;

    /// Applies all staged writes and releases the locks.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError`, applying nothing, when a bed
    /// touched by the transaction would end up occupied without exactly one
    /// open encounter on it, or free with one.
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards all staged writes and releases the locks.
    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}
