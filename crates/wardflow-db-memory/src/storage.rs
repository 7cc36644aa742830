use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use wardflow_core::{
    Bed, BedId, BedStatus, Encounter, EncounterId, EntityKind, PatientId, Vocabulary, Ward,
    WardId, now_utc,
};
use wardflow_storage::{
    BedFilter, BedRegistry, EncounterLedger, FlowStore, FlowTransaction, LockKey, StorageError,
    StorageResult, TransactionStats,
};

use crate::locks::LockTable;
use crate::transaction::InMemoryTransaction;

/// Shared state behind an [`InMemoryStore`] and its transactions.
pub(crate) struct StoreState {
    pub(crate) wards: PapayaHashMap<WardId, Ward>,
    pub(crate) beds: PapayaHashMap<BedId, Bed>,
    /// (ward, bed number) -> bed id, enforces number uniqueness per ward
    pub(crate) bed_numbers: PapayaHashMap<(WardId, String), BedId>,
    pub(crate) encounters: PapayaHashMap<EncounterId, Encounter>,
    pub(crate) open_by_patient: PapayaHashMap<PatientId, EncounterId>,
    pub(crate) open_by_bed: PapayaHashMap<BedId, EncounterId>,
    pub(crate) locks: LockTable,
    pub(crate) vocabulary: Arc<Vocabulary>,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl StoreState {
    fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            wards: PapayaHashMap::new(),
            beds: PapayaHashMap::new(),
            bed_numbers: PapayaHashMap::new(),
            encounters: PapayaHashMap::new(),
            open_by_patient: PapayaHashMap::new(),
            open_by_bed: PapayaHashMap::new(),
            locks: LockTable::new(),
            vocabulary,
            committed: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    fn stats(&self) -> TransactionStats {
        TransactionStats {
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
        }
    }

    /// Looks up an open encounter through an index, ignoring stale entries.
    fn open_via_index<K>(
        &self,
        index: &PapayaHashMap<K, EncounterId>,
        key: &K,
    ) -> Option<Encounter>
    where
        K: std::hash::Hash + Eq,
    {
        let id = index.pin().get(key).cloned()?;
        self.encounters
            .pin()
            .get(&id)
            .filter(|e| e.is_open())
            .cloned()
    }
}

/// In-memory bed registry and encounter ledger.
///
/// This storage implementation provides:
/// - Lock-free snapshot reads via papaya::HashMap
/// - Per-row async locks for writes, so unrelated beds never contend
/// - Staged transactions that apply on commit and vanish on rollback
/// - Open-encounter indexes by patient and by bed
pub struct InMemoryStore {
    pub(crate) state: Arc<StoreState>,
}

impl InMemoryStore {
    /// Creates a new store with the baseline vocabulary.
    pub fn new() -> Self {
        Self::with_vocabulary(Arc::new(Vocabulary::baseline()))
    }

    /// Creates a new store validating against `vocabulary`.
    pub fn with_vocabulary(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            state: Arc::new(StoreState::new(vocabulary)),
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.state.vocabulary
    }

    pub fn bed_count(&self) -> usize {
        self.state.beds.pin().len()
    }

    pub fn encounter_count(&self) -> usize {
        self.state.encounters.pin().len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("beds", &self.bed_count())
            .field("encounters", &self.encounter_count())
            .field("locks", &self.state.locks)
            .finish()
    }
}

#[async_trait]
impl BedRegistry for InMemoryStore {
    async fn register_ward(&self, ward: Ward) -> StorageResult<Ward> {
        let wards = self.state.wards.pin();
        if wards.try_insert(ward.id.clone(), ward.clone()).is_err() {
            warn!(ward_id = %ward.id, "ward already registered");
            return Err(StorageError::already_exists(
                EntityKind::Ward,
                ward.id.as_str(),
            ));
        }
        debug!(ward_id = %ward.id, "registered ward");
        Ok(ward)
    }

    async fn register_bed(&self, bed: Bed) -> StorageResult<Bed> {
        self.state.vocabulary.check_bed_type(&bed.bed_type)?;
        self.state.vocabulary.check_bed_status(&bed.status)?;
        if bed.is_occupied() {
            return Err(StorageError::invalid_transition(
                bed.id.as_str(),
                "unregistered",
                BedStatus::OCCUPIED.as_str(),
            ));
        }
        if !self.state.wards.pin().contains_key(&bed.ward_id) {
            return Err(StorageError::not_found(
                EntityKind::Ward,
                bed.ward_id.as_str(),
            ));
        }

        let number_key = (bed.ward_id.clone(), bed.number.clone());
        let numbers = self.state.bed_numbers.pin();
        if numbers.try_insert(number_key.clone(), bed.id.clone()).is_err() {
            warn!(ward_id = %bed.ward_id, number = %bed.number, "bed number already used in ward");
            return Err(StorageError::already_exists(
                EntityKind::Bed,
                format!("{}/{}", bed.ward_id, bed.number),
            ));
        }

        let beds = self.state.beds.pin();
        if beds.try_insert(bed.id.clone(), bed.clone()).is_err() {
            numbers.remove(&number_key);
            warn!(bed_id = %bed.id, "bed already registered");
            return Err(StorageError::already_exists(EntityKind::Bed, bed.id.as_str()));
        }
        debug!(bed_id = %bed.id, ward_id = %bed.ward_id, "registered bed");
        Ok(bed)
    }

    async fn get_ward(&self, id: &WardId) -> StorageResult<Ward> {
        self.state
            .wards
            .pin()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Ward, id.as_str()))
    }

    async fn list_wards(&self) -> StorageResult<Vec<Ward>> {
        let mut wards: Vec<Ward> = self
            .state
            .wards
            .pin()
            .iter()
            .map(|(_, ward)| ward.clone())
            .collect();
        wards.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(wards)
    }

    async fn get_bed(&self, id: &BedId) -> StorageResult<Bed> {
        self.state
            .beds
            .pin()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Bed, id.as_str()))
    }

    async fn list_beds(&self, filter: &BedFilter) -> StorageResult<Vec<Bed>> {
        let mut beds: Vec<Bed> = self
            .state
            .beds
            .pin()
            .iter()
            .filter(|(_, bed)| filter.matches(bed))
            .map(|(_, bed)| bed.clone())
            .collect();
        beds.sort_by(|a, b| {
            (&a.ward_id, &a.number, &a.id).cmp(&(&b.ward_id, &b.number, &b.id))
        });
        Ok(beds)
    }

    async fn set_status(&self, id: &BedId, status: BedStatus) -> StorageResult<Bed> {
        self.state.vocabulary.check_bed_status(&status)?;
        if !self.state.beds.pin().contains_key(id) {
            return Err(StorageError::not_found(EntityKind::Bed, id.as_str()));
        }
        let _row = self.state.locks.acquire(&LockKey::bed(id)).await;

        let beds = self.state.beds.pin();
        let current = beds
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Bed, id.as_str()))?;
        if current.is_occupied() || status.is_occupied() {
            return Err(StorageError::invalid_transition(
                id.as_str(),
                current.status.as_str(),
                status.as_str(),
            ));
        }
        if current.status == status {
            return Ok(current);
        }

        let updated = Bed {
            status,
            updated_at: now_utc(),
            ..current
        };
        beds.insert(id.clone(), updated.clone());
        debug!(bed_id = %id, status = %updated.status, "bed status set");
        Ok(updated)
    }
}

#[async_trait]
impl EncounterLedger for InMemoryStore {
    async fn get_encounter(&self, id: &EncounterId) -> StorageResult<Encounter> {
        self.state
            .encounters
            .pin()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Encounter, id.as_str()))
    }

    async fn open_encounter_for_patient(
        &self,
        patient_id: &PatientId,
    ) -> StorageResult<Option<Encounter>> {
        Ok(self
            .state
            .open_via_index(&self.state.open_by_patient, patient_id))
    }

    async fn open_encounter_for_bed(&self, bed_id: &BedId) -> StorageResult<Option<Encounter>> {
        Ok(self.state.open_via_index(&self.state.open_by_bed, bed_id))
    }

    async fn encounters_for_patient(
        &self,
        patient_id: &PatientId,
    ) -> StorageResult<Vec<Encounter>> {
        let mut encounters: Vec<Encounter> = self
            .state
            .encounters
            .pin()
            .iter()
            .filter(|(_, e)| e.patient_id == *patient_id)
            .map(|(_, e)| e.clone())
            .collect();
        encounters.sort_by(|a, b| (a.admitted_at, &a.id).cmp(&(b.admitted_at, &b.id)));
        Ok(encounters)
    }
}

#[async_trait]
impl FlowStore for InMemoryStore {
    async fn begin_transaction(&self) -> StorageResult<Box<dyn FlowTransaction>> {
        Ok(Box::new(InMemoryTransaction::new(self.state.clone())))
    }

    fn transaction_stats(&self) -> TransactionStats {
        self.state.stats()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
