//! Staged, row-locked transactions over the in-memory store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;
use wardflow_core::{
    Bed, BedId, BedStatus, DischargeMetadata, Encounter, EncounterEvent, EncounterId,
    EncounterStatus, EntityKind, PatientId, Timestamp,
};
use wardflow_storage::{FlowTransaction, LockKey, StorageError, StorageResult, TransactionState};

use crate::storage::StoreState;

pub struct InMemoryTransaction {
    state: Arc<StoreState>,
    held: BTreeMap<LockKey, OwnedMutexGuard<()>>,
    staged_beds: BTreeMap<BedId, Bed>,
    staged_encounters: BTreeMap<EncounterId, Encounter>,
    status: TransactionState,
}

impl InMemoryTransaction {
    pub(crate) fn new(state: Arc<StoreState>) -> Self {
        Self {
            state,
            held: BTreeMap::new(),
            staged_beds: BTreeMap::new(),
            staged_encounters: BTreeMap::new(),
            status: TransactionState::Active,
        }
    }

    fn require_lock(&self, key: LockKey) -> StorageResult<()> {
        if self.held.contains_key(&key) {
            Ok(())
        } else {
            Err(StorageError::transaction_error(format!(
                "write to {key} without holding its lock"
            )))
        }
    }

    fn stage_encounter(&mut self, encounter: Encounter) -> Encounter {
        self.staged_encounters
            .insert(encounter.id.clone(), encounter.clone());
        encounter
    }

    /// Every bed touched by the staged writes must end up occupied iff
    /// exactly one open encounter references it, and must be locked.
    fn check_occupancy(&self) -> StorageResult<()> {
        let encounters = self.state.encounters.pin();
        let open_by_bed = self.state.open_by_bed.pin();
        let beds = self.state.beds.pin();

        let mut touched: BTreeSet<&BedId> = self.staged_beds.keys().collect();
        for (id, encounter) in &self.staged_encounters {
            touched.insert(&encounter.bed_id);
            if let Some(previous) = encounters.get(id) {
                touched.insert(&previous.bed_id);
            }
        }

        for bed_id in touched {
            self.require_lock(LockKey::bed(bed_id))?;
            let occupied = match self.staged_beds.get(bed_id) {
                Some(bed) => bed.is_occupied(),
                None => beds.get(bed_id).is_some_and(|bed| bed.is_occupied()),
            };
            let staged_open = self
                .staged_encounters
                .values()
                .filter(|e| e.is_open() && e.bed_id == *bed_id)
                .count();
            let stored_open = open_by_bed
                .get(bed_id)
                .filter(|id| !self.staged_encounters.contains_key(*id))
                .and_then(|id| encounters.get(id))
                .is_some_and(|e| e.is_open());
            let open = staged_open + usize::from(stored_open);

            let consistent = if occupied { open == 1 } else { open == 0 };
            if !consistent {
                return Err(StorageError::transaction_error(format!(
                    "bed {bed_id} would be {} with {open} open encounters",
                    if occupied { "occupied" } else { "free" }
                )));
            }
        }
        Ok(())
    }

    /// Publishes staged rows. Encounters go first so the open-encounter
    /// indexes are in place by the time a bed reads as occupied.
    fn apply(&mut self) {
        let encounters = self.state.encounters.pin();
        let by_patient = self.state.open_by_patient.pin();
        let by_bed = self.state.open_by_bed.pin();

        for (id, encounter) in std::mem::take(&mut self.staged_encounters) {
            if let Some(previous) = encounters.get(&id)
                && previous.is_open()
                && by_bed.get(&previous.bed_id) == Some(&id)
            {
                by_bed.remove(&previous.bed_id);
            }
            if encounter.is_open() {
                by_patient.insert(encounter.patient_id.clone(), id.clone());
                by_bed.insert(encounter.bed_id.clone(), id.clone());
            } else if by_patient.get(&encounter.patient_id) == Some(&id) {
                by_patient.remove(&encounter.patient_id);
            }
            encounters.insert(id, encounter);
        }

        let beds = self.state.beds.pin();
        for (id, bed) in std::mem::take(&mut self.staged_beds) {
            beds.insert(id, bed);
        }
    }
}

impl std::fmt::Debug for InMemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransaction")
            .field("status", &self.status)
            .field("held", &self.held.keys().collect::<Vec<_>>())
            .field("staged_beds", &self.staged_beds.len())
            .field("staged_encounters", &self.staged_encounters.len())
            .finish()
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if self.status == TransactionState::Active {
            debug!(
                staged_beds = self.staged_beds.len(),
                staged_encounters = self.staged_encounters.len(),
                "transaction dropped without commit"
            );
            self.state.record_rollback();
        }
    }
}

#[async_trait]
impl FlowTransaction for InMemoryTransaction {
    async fn lock(&mut self, key: LockKey) -> StorageResult<()> {
        if self.held.contains_key(&key) {
            return Ok(());
        }
        if let Some((highest, _)) = self.held.last_key_value()
            && key < *highest
        {
            return Err(StorageError::transaction_error(format!(
                "lock {key} requested after {highest}"
            )));
        }
        // no lock rows for beds or encounters that do not exist
        let missing = match &key {
            LockKey::Patient(_) => None,
            LockKey::Encounter(id) => (!self.staged_encounters.contains_key(id)
                && !self.state.encounters.pin().contains_key(id))
            .then(|| StorageError::not_found(EntityKind::Encounter, id.as_str())),
            LockKey::Bed(id) => (!self.state.beds.pin().contains_key(id))
                .then(|| StorageError::not_found(EntityKind::Bed, id.as_str())),
        };
        if let Some(err) = missing {
            return Err(err);
        }
        let guard = self.state.locks.acquire(&key).await;
        debug!(lock = %key, "row lock acquired");
        self.held.insert(key, guard);
        Ok(())
    }

    async fn lock_all(&mut self, mut keys: Vec<LockKey>) -> StorageResult<()> {
        keys.sort();
        keys.dedup();
        for key in keys {
            self.lock(key).await?;
        }
        Ok(())
    }

    fn bed(&self, id: &BedId) -> StorageResult<Bed> {
        if let Some(bed) = self.staged_beds.get(id) {
            return Ok(bed.clone());
        }
        self.state
            .beds
            .pin()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Bed, id.as_str()))
    }

    fn encounter(&self, id: &EncounterId) -> StorageResult<Encounter> {
        if let Some(encounter) = self.staged_encounters.get(id) {
            return Ok(encounter.clone());
        }
        self.state
            .encounters
            .pin()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Encounter, id.as_str()))
    }

    fn open_encounter_for_patient(
        &self,
        patient_id: &PatientId,
    ) -> StorageResult<Option<Encounter>> {
        if let Some(staged) = self
            .staged_encounters
            .values()
            .find(|e| e.patient_id == *patient_id && e.is_open())
        {
            return Ok(Some(staged.clone()));
        }
        let indexed = self.state.open_by_patient.pin().get(patient_id).cloned();
        match indexed {
            Some(id) => {
                let encounter = self.encounter(&id)?;
                Ok(encounter.is_open().then_some(encounter))
            }
            None => Ok(None),
        }
    }

    fn set_bed_status(
        &mut self,
        id: &BedId,
        status: BedStatus,
        at: Timestamp,
    ) -> StorageResult<Bed> {
        self.require_lock(LockKey::bed(id))?;
        self.state.vocabulary.check_bed_status(&status)?;
        let mut bed = self.bed(id)?;
        bed.status = status;
        bed.updated_at = at;
        self.staged_beds.insert(id.clone(), bed.clone());
        Ok(bed)
    }

    fn create_encounter(
        &mut self,
        patient_id: &PatientId,
        bed_id: &BedId,
        admitted_at: Timestamp,
        clinical_metadata: Value,
    ) -> StorageResult<Encounter> {
        self.require_lock(LockKey::patient(patient_id))?;
        self.require_lock(LockKey::bed(bed_id))?;
        if let Some(open) = self.open_encounter_for_patient(patient_id)? {
            return Err(StorageError::duplicate_admission(
                patient_id.as_str(),
                open.id.as_str(),
            ));
        }
        self.bed(bed_id)?;

        let encounter = Encounter::open(
            patient_id.clone(),
            bed_id.clone(),
            admitted_at,
            clinical_metadata,
        );
        Ok(self.stage_encounter(encounter))
    }

    fn close_encounter(
        &mut self,
        id: &EncounterId,
        discharged_at: Timestamp,
        metadata: DischargeMetadata,
    ) -> StorageResult<Encounter> {
        let mut encounter = self.encounter(id)?;
        self.require_lock(LockKey::patient(&encounter.patient_id))?;
        self.require_lock(LockKey::encounter(id))?;
        if !encounter.is_open() {
            return Err(StorageError::encounter_not_open(id.as_str()));
        }

        encounter.status = EncounterStatus::Discharged;
        encounter.discharged_at = Some(discharged_at);
        encounter.discharge = Some(metadata);
        encounter.history.push(EncounterEvent::Discharged {
            bed_id: encounter.bed_id.clone(),
            at: discharged_at,
        });
        Ok(self.stage_encounter(encounter))
    }

    fn repoint_encounter(
        &mut self,
        id: &EncounterId,
        new_bed_id: &BedId,
        reason: String,
        at: Timestamp,
    ) -> StorageResult<Encounter> {
        let mut encounter = self.encounter(id)?;
        self.require_lock(LockKey::encounter(id))?;
        self.require_lock(LockKey::bed(&encounter.bed_id))?;
        self.require_lock(LockKey::bed(new_bed_id))?;
        if !encounter.is_open() {
            return Err(StorageError::encounter_not_open(id.as_str()));
        }
        self.bed(new_bed_id)?;

        encounter.history.push(EncounterEvent::Transferred {
            from_bed_id: encounter.bed_id.clone(),
            to_bed_id: new_bed_id.clone(),
            at,
            reason,
        });
        encounter.bed_id = new_bed_id.clone();
        Ok(self.stage_encounter(encounter))
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let mut tx = self;
        if tx.status != TransactionState::Active {
            return Err(StorageError::transaction_error(
                "transaction is no longer active",
            ));
        }
        if let Err(err) = tx.check_occupancy() {
            tx.status = TransactionState::RolledBack;
            tx.state.record_rollback();
            debug!(error = %err, "transaction rejected at commit");
            return Err(err);
        }
        tx.apply();
        tx.status = TransactionState::Committed;
        tx.state.record_commit();
        debug!(locks = tx.held.len(), "transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        let mut tx = self;
        if tx.status != TransactionState::Active {
            return Err(StorageError::transaction_error(
                "transaction is no longer active",
            ));
        }
        tx.staged_beds.clear();
        tx.staged_encounters.clear();
        tx.status = TransactionState::RolledBack;
        tx.state.record_rollback();
        Ok(())
    }
}
