//! The bed state machine.
//!
//! ```text
//!              admit                 discharge
//!  available ─────────▶ occupied ─────────────▶ available
//!                        │    ▲
//!                        └────┘ transfer (source bed → available)
//!
//!  available ◀──set_status──▶ maintenance | cleaning | <configured>
//! ```
//!
//! Every mutating operation runs in one store transaction. Locks are taken
//! in the store's global order (patient, encounter, beds) and every
//! precondition is checked under them, so either all staged writes commit or
//! none do.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use wardflow_core::{
    Bed, BedId, BedStatus, DischargeMetadata, Encounter, EncounterId, EventBroadcaster,
    FlowError, FlowEvent, PatientId, Result, Timestamp, now_utc,
};
use wardflow_storage::{
    BedRegistry, DynFlowStore, EncounterLedger, FlowStore, FlowTransaction, LockKey,
};

pub struct FlowOrchestrator {
    store: DynFlowStore,
    events: Arc<EventBroadcaster>,
}

impl FlowOrchestrator {
    pub fn new(store: DynFlowStore, events: Arc<EventBroadcaster>) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> &DynFlowStore {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBroadcaster> {
        &self.events
    }

    /// Admits a patient into an available bed and opens an encounter.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown bed, `BedNotAvailable` unless the bed is
    /// exactly `available`, `PatientAlreadyAdmitted` if the patient already
    /// has an open encounter.
    #[instrument(skip(self, clinical_metadata), fields(patient_id = %patient_id, bed_id = %bed_id))]
    pub async fn admit(
        &self,
        patient_id: &PatientId,
        bed_id: &BedId,
        admitted_at: Timestamp,
        clinical_metadata: Value,
    ) -> Result<Encounter> {
        let mut tx = self.store.begin_transaction().await?;
        match stage_admit(tx.as_mut(), patient_id, bed_id, admitted_at, clinical_metadata).await
        {
            Ok((encounter, bed)) => {
                tx.commit().await?;
                info!(
                    encounter_id = %encounter.id,
                    ward_id = %bed.ward_id,
                    "Admitted patient"
                );
                self.events.send(FlowEvent::Admitted {
                    encounter_id: encounter.id.clone(),
                    patient_id: encounter.patient_id.clone(),
                    bed_id: encounter.bed_id.clone(),
                    ward_id: bed.ward_id,
                    timestamp: admitted_at,
                });
                Ok(encounter)
            }
            Err(err) => Err(abandon(tx, err).await),
        }
    }

    /// Moves an open encounter to another available bed.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown encounter or target bed, `EncounterNotOpen`
    /// after discharge, `NoOpTransfer` when the target is the current bed,
    /// `BedNotAvailable` unless the target is exactly `available`.
    #[instrument(
        skip(self, reason),
        fields(encounter_id = %encounter_id, target_bed_id = %target_bed_id)
    )]
    pub async fn transfer(
        &self,
        encounter_id: &EncounterId,
        target_bed_id: &BedId,
        reason: impl Into<String>,
    ) -> Result<Encounter> {
        let reason = reason.into();
        // the patient never changes, so an unlocked read is enough to pick the lock
        let patient_id = self.store.get_encounter(encounter_id).await?.patient_id;

        let mut tx = self.store.begin_transaction().await?;
        match stage_transfer(tx.as_mut(), &patient_id, encounter_id, target_bed_id, reason).await
        {
            Ok((encounter, from_bed_id)) => {
                tx.commit().await?;
                info!(
                    patient_id = %encounter.patient_id,
                    from_bed_id = %from_bed_id,
                    "Transferred patient"
                );
                self.events.send(FlowEvent::Transferred {
                    encounter_id: encounter.id.clone(),
                    patient_id: encounter.patient_id.clone(),
                    from_bed_id,
                    to_bed_id: encounter.bed_id.clone(),
                    timestamp: encounter
                        .history
                        .last()
                        .map(|event| event.at())
                        .unwrap_or_else(now_utc),
                });
                Ok(encounter)
            }
            Err(err) => Err(abandon(tx, err).await),
        }
    }

    /// Closes an open encounter and frees its bed.
    ///
    /// Discharge is keyed strictly by encounter id.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown encounter, `EncounterNotOpen` if already
    /// discharged, `InvalidTimestamp` when `discharged_at` precedes admission.
    #[instrument(skip(self, metadata), fields(encounter_id = %encounter_id))]
    pub async fn discharge(
        &self,
        encounter_id: &EncounterId,
        discharged_at: Timestamp,
        metadata: DischargeMetadata,
    ) -> Result<Encounter> {
        let patient_id = self.store.get_encounter(encounter_id).await?.patient_id;

        let mut tx = self.store.begin_transaction().await?;
        match stage_discharge(tx.as_mut(), &patient_id, encounter_id, discharged_at, metadata)
            .await
        {
            Ok(encounter) => {
                tx.commit().await?;
                info!(
                    patient_id = %encounter.patient_id,
                    bed_id = %encounter.bed_id,
                    "Discharged patient"
                );
                self.events.send(FlowEvent::Discharged {
                    encounter_id: encounter.id.clone(),
                    patient_id: encounter.patient_id.clone(),
                    bed_id: encounter.bed_id.clone(),
                    timestamp: discharged_at,
                });
                Ok(encounter)
            }
            Err(err) => Err(abandon(tx, err).await),
        }
    }

    /// Toggles a bed between non-occupied statuses (maintenance, cleaning,
    /// available and configured extras).
    ///
    /// # Errors
    ///
    /// `InvalidTransition` into or out of `occupied`, `InvalidVocabulary` for
    /// an unknown status, `NotFound` for an unknown bed.
    #[instrument(skip(self), fields(bed_id = %bed_id, status = %status))]
    pub async fn set_bed_status(&self, bed_id: &BedId, status: BedStatus) -> Result<Bed> {
        let bed = self.store.set_status(bed_id, status).await.map_err(|err| {
            let err = FlowError::from(err);
            debug!(category = %err.category(), error = %err, "Bed status change rejected");
            err
        })?;
        info!(ward_id = %bed.ward_id, "Bed status changed");
        self.events.send(FlowEvent::BedStatusChanged {
            bed_id: bed.id.clone(),
            ward_id: bed.ward_id.clone(),
            status: bed.status.clone(),
            timestamp: bed.updated_at,
        });
        Ok(bed)
    }
}

async fn abandon(tx: Box<dyn FlowTransaction>, err: FlowError) -> FlowError {
    debug!(category = %err.category(), error = %err, "Flow operation rejected");
    if let Err(rollback_err) = tx.rollback().await {
        warn!(error = %rollback_err, "Rollback failed");
    }
    err
}

async fn stage_admit(
    tx: &mut dyn FlowTransaction,
    patient_id: &PatientId,
    bed_id: &BedId,
    admitted_at: Timestamp,
    clinical_metadata: Value,
) -> Result<(Encounter, Bed)> {
    // beds are never removed, so an unknown bed takes no patient lock
    tx.bed(bed_id)?;
    tx.lock_all(vec![LockKey::patient(patient_id), LockKey::bed(bed_id)])
        .await?;

    let bed = tx.bed(bed_id)?;
    if !bed.is_available() {
        return Err(FlowError::bed_not_available(
            bed_id.as_str(),
            bed.status.as_str(),
        ));
    }
    if let Some(open) = tx.open_encounter_for_patient(patient_id)? {
        return Err(FlowError::patient_already_admitted(
            patient_id.as_str(),
            open.id.as_str(),
        ));
    }

    let bed = tx.set_bed_status(bed_id, BedStatus::OCCUPIED, now_utc())?;
    let encounter = tx.create_encounter(patient_id, bed_id, admitted_at, clinical_metadata)?;
    Ok((encounter, bed))
}

async fn stage_transfer(
    tx: &mut dyn FlowTransaction,
    patient_id: &PatientId,
    encounter_id: &EncounterId,
    target_bed_id: &BedId,
    reason: String,
) -> Result<(Encounter, BedId)> {
    tx.lock_all(vec![
        LockKey::patient(patient_id),
        LockKey::encounter(encounter_id),
    ])
    .await?;

    let encounter = tx.encounter(encounter_id)?;
    if !encounter.is_open() {
        return Err(FlowError::encounter_not_open(encounter_id.as_str()));
    }
    if encounter.bed_id == *target_bed_id {
        return Err(FlowError::no_op_transfer(
            encounter_id.as_str(),
            target_bed_id.as_str(),
        ));
    }

    let source_bed_id = encounter.bed_id;
    tx.lock_all(vec![
        LockKey::bed(&source_bed_id),
        LockKey::bed(target_bed_id),
    ])
    .await?;

    let target = tx.bed(target_bed_id)?;
    if !target.is_available() {
        return Err(FlowError::bed_not_available(
            target_bed_id.as_str(),
            target.status.as_str(),
        ));
    }

    let now = now_utc();
    tx.set_bed_status(&source_bed_id, BedStatus::AVAILABLE, now)?;
    tx.set_bed_status(target_bed_id, BedStatus::OCCUPIED, now)?;
    let encounter = tx.repoint_encounter(encounter_id, target_bed_id, reason, now)?;
    Ok((encounter, source_bed_id))
}

async fn stage_discharge(
    tx: &mut dyn FlowTransaction,
    patient_id: &PatientId,
    encounter_id: &EncounterId,
    discharged_at: Timestamp,
    metadata: DischargeMetadata,
) -> Result<Encounter> {
    tx.lock_all(vec![
        LockKey::patient(patient_id),
        LockKey::encounter(encounter_id),
    ])
    .await?;

    let encounter = tx.encounter(encounter_id)?;
    if !encounter.is_open() {
        return Err(FlowError::encounter_not_open(encounter_id.as_str()));
    }
    if discharged_at < encounter.admitted_at {
        return Err(FlowError::invalid_timestamp(format!(
            "discharge at {discharged_at} precedes admission at {}",
            encounter.admitted_at
        )));
    }

    tx.lock(LockKey::bed(&encounter.bed_id)).await?;
    tx.set_bed_status(&encounter.bed_id, BedStatus::AVAILABLE, now_utc())?;
    Ok(tx.close_encounter(encounter_id, discharged_at, metadata)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wardflow_core::{BedType, FlowEventType, Ward};
    use wardflow_db_memory::InMemoryStore;

    async fn orchestrator() -> FlowOrchestrator {
        let store = InMemoryStore::new();
        store.register_ward(Ward::new("A", "Acute")).await.unwrap();
        for n in ["101", "102", "103"] {
            store
                .register_bed(Bed::new(format!("A-{n}"), "A", n, BedType::GENERAL))
                .await
                .unwrap();
        }
        FlowOrchestrator::new(Arc::new(store), EventBroadcaster::new_shared())
    }

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_unix_timestamp(secs).unwrap()
    }

    #[tokio::test]
    async fn test_admit_occupies_bed() {
        let flow = orchestrator().await;
        let bed = BedId::from("A-101");

        let encounter = flow
            .admit(&PatientId::from("42"), &bed, ts(1_700_000_000), json!({"triage": 2}))
            .await
            .unwrap();

        assert!(encounter.is_open());
        assert_eq!(encounter.bed_id, bed);
        assert_eq!(encounter.clinical_metadata["triage"], 2);
        assert!(flow.store().get_bed(&bed).await.unwrap().is_occupied());
    }

    #[tokio::test]
    async fn test_admit_rejects_unavailable_bed() {
        let flow = orchestrator().await;
        let bed = BedId::from("A-101");
        flow.set_bed_status(&bed, BedStatus::CLEANING).await.unwrap();

        let err = flow
            .admit(&PatientId::from("42"), &bed, ts(1_700_000_000), Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::BedNotAvailable { .. }));

        let err = flow
            .admit(&PatientId::from("42"), &BedId::from("Z-9"), ts(1_700_000_000), Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
        assert_eq!(flow.store().transaction_stats().committed, 0);
    }

    #[tokio::test]
    async fn test_transfer_frees_source() {
        let flow = orchestrator().await;
        let (a101, a102) = (BedId::from("A-101"), BedId::from("A-102"));
        let encounter = flow
            .admit(&PatientId::from("42"), &a101, ts(1_700_000_000), Value::Null)
            .await
            .unwrap();

        let moved = flow
            .transfer(&encounter.id, &a102, "closer to nursing station")
            .await
            .unwrap();

        assert_eq!(moved.bed_id, a102);
        assert!(flow.store().get_bed(&a101).await.unwrap().is_available());
        assert!(flow.store().get_bed(&a102).await.unwrap().is_occupied());
        assert!(matches!(
            moved.history.last(),
            Some(wardflow_core::EncounterEvent::Transferred { reason, .. })
                if reason == "closer to nursing station"
        ));
    }

    #[tokio::test]
    async fn test_transfer_to_unavailable_target_changes_nothing() {
        let flow = orchestrator().await;
        let (a101, a102) = (BedId::from("A-101"), BedId::from("A-102"));
        let encounter = flow
            .admit(&PatientId::from("42"), &a101, ts(1_700_000_000), Value::Null)
            .await
            .unwrap();
        flow.set_bed_status(&a102, BedStatus::MAINTENANCE).await.unwrap();

        let err = flow.transfer(&encounter.id, &a102, "").await.unwrap_err();
        assert!(matches!(err, FlowError::BedNotAvailable { .. }));

        let current = flow.store().get_encounter(&encounter.id).await.unwrap();
        assert_eq!(current.bed_id, a101);
        assert!(flow.store().get_bed(&a101).await.unwrap().is_occupied());
        assert_eq!(
            flow.store().get_bed(&a102).await.unwrap().status,
            BedStatus::MAINTENANCE
        );
    }

    #[tokio::test]
    async fn test_discharge_frees_bed_and_stores_metadata() {
        let flow = orchestrator().await;
        let bed = BedId::from("A-103");
        let encounter = flow
            .admit(&PatientId::from("42"), &bed, ts(1_700_000_000), Value::Null)
            .await
            .unwrap();

        let metadata = DischargeMetadata::new()
            .with_type("home")
            .with_condition("stable")
            .with_follow_up("GP in 7 days");
        let closed = flow
            .discharge(&encounter.id, ts(1_700_086_400), metadata.clone())
            .await
            .unwrap();

        assert!(!closed.is_open());
        assert_eq!(closed.discharged_at, Some(ts(1_700_086_400)));
        assert_eq!(closed.discharge, Some(metadata));
        assert_eq!(closed.bed_id, bed);
        assert!(flow.store().get_bed(&bed).await.unwrap().is_available());
    }

    #[tokio::test]
    async fn test_discharge_before_admission_is_rejected() {
        let flow = orchestrator().await;
        let bed = BedId::from("A-101");
        let encounter = flow
            .admit(&PatientId::from("42"), &bed, ts(1_700_000_000), Value::Null)
            .await
            .unwrap();

        let err = flow
            .discharge(&encounter.id, ts(1_600_000_000), DischargeMetadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidTimestamp(_)));
        assert!(flow.store().get_bed(&bed).await.unwrap().is_occupied());
    }

    #[tokio::test]
    async fn test_set_bed_status_rejects_occupied_bed() {
        let flow = orchestrator().await;
        let bed = BedId::from("A-101");
        flow.admit(&PatientId::from("42"), &bed, ts(1_700_000_000), Value::Null)
            .await
            .unwrap();

        let err = flow
            .set_bed_status(&bed, BedStatus::CLEANING)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_events_follow_commits_only() {
        let flow = orchestrator().await;
        let mut events = flow.events().subscribe();
        let bed = BedId::from("A-101");

        let encounter = flow
            .admit(&PatientId::from("42"), &bed, ts(1_700_000_000), Value::Null)
            .await
            .unwrap();
        // rejected, must not publish
        flow.admit(&PatientId::from("43"), &bed, ts(1_700_000_000), Value::Null)
            .await
            .unwrap_err();
        flow.discharge(&encounter.id, ts(1_700_000_500), DischargeMetadata::new())
            .await
            .unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.event_type(), FlowEventType::Admitted);
        let second = events.recv().await.unwrap();
        assert_eq!(second.event_type(), FlowEventType::Discharged);
        assert!(events.try_recv().is_err());
    }
}
