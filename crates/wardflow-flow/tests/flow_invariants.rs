use futures_util::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wardflow_core::{
    Bed, BedId, BedStatus, BedType, DischargeMetadata, EncounterId, EncounterStatus,
    EventBroadcaster, FlowError, PatientId, Ward, now_utc,
};
use wardflow_db_memory::InMemoryStore;
use wardflow_flow::FlowOrchestrator;
use wardflow_storage::{BedFilter, BedRegistry, DynFlowStore, EncounterLedger, FlowStore};

async fn seeded_store(wards: &[&str], beds_per_ward: usize) -> DynFlowStore {
    let store = InMemoryStore::new();
    for ward in wards {
        store.register_ward(Ward::new(*ward, *ward)).await.unwrap();
        for n in 1..=beds_per_ward {
            store
                .register_bed(Bed::new(
                    format!("{ward}-{n:02}"),
                    *ward,
                    format!("{n:02}"),
                    BedType::GENERAL,
                ))
                .await
                .unwrap();
        }
    }
    Arc::new(store)
}

/// A bed is occupied iff exactly one open encounter references it, and every
/// open encounter points at an occupied bed.
async fn assert_bijection(store: &DynFlowStore, patients: &[PatientId]) {
    let beds = store.list_beds(&BedFilter::new()).await.unwrap();
    let mut open_by_bed: HashMap<BedId, usize> = HashMap::new();
    for patient in patients {
        for encounter in store.encounters_for_patient(patient).await.unwrap() {
            if encounter.is_open() {
                *open_by_bed.entry(encounter.bed_id.clone()).or_default() += 1;
            }
        }
    }
    for bed in &beds {
        let refs = open_by_bed.get(&bed.id).copied().unwrap_or(0);
        if bed.is_occupied() {
            assert_eq!(refs, 1, "occupied bed {} has {refs} open encounters", bed.id);
        } else {
            assert_eq!(refs, 0, "{} bed {} has open encounters", bed.status, bed.id);
        }
    }
}

#[tokio::test]
async fn random_operations_preserve_occupancy_bijection() {
    let store = seeded_store(&["A", "B"], 4).await;
    let flow = FlowOrchestrator::new(store.clone(), EventBroadcaster::new_shared());
    let patients: Vec<PatientId> = (0..6).map(|n| PatientId::new(format!("p{n}"))).collect();
    let beds: Vec<BedId> = store
        .list_beds(&BedFilter::new())
        .await
        .unwrap()
        .into_iter()
        .map(|bed| bed.id)
        .collect();
    let statuses = [
        BedStatus::AVAILABLE,
        BedStatus::MAINTENANCE,
        BedStatus::CLEANING,
    ];

    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let mut open: Vec<EncounterId> = Vec::new();

    for _ in 0..300 {
        let bed = &beds[rng.usize(..beds.len())];
        match rng.u8(..4) {
            0 => {
                let patient = &patients[rng.usize(..patients.len())];
                if let Ok(encounter) = flow.admit(patient, bed, now_utc(), Value::Null).await {
                    open.push(encounter.id);
                }
            }
            1 if !open.is_empty() => {
                let encounter = &open[rng.usize(..open.len())];
                let _ = flow.transfer(encounter, bed, "shuffle").await;
            }
            2 if !open.is_empty() => {
                let encounter = open.swap_remove(rng.usize(..open.len()));
                flow.discharge(&encounter, now_utc(), DischargeMetadata::new())
                    .await
                    .unwrap();
            }
            _ => {
                let status = statuses[rng.usize(..statuses.len())].clone();
                let _ = flow.set_bed_status(bed, status).await;
            }
        }
        assert_bijection(&store, &patients).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_to_one_bed_admit_exactly_one() {
    let store = seeded_store(&["B"], 5).await;
    let flow = Arc::new(FlowOrchestrator::new(
        store.clone(),
        EventBroadcaster::new_shared(),
    ));
    let bed = BedId::from("B-05");

    let attempts = ["7", "8"].map(|patient| {
        let flow = flow.clone();
        let bed = bed.clone();
        tokio::spawn(async move {
            flow.admit(&PatientId::from(patient), &bed, now_utc(), Value::Null)
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let admitted = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(admitted, 1);
    assert!(
        results
            .iter()
            .any(|result| matches!(result, Err(FlowError::BedNotAvailable { .. })))
    );

    let open = store.open_encounter_for_bed(&bed).await.unwrap();
    assert!(open.is_some());
    assert_bijection(&store, &[PatientId::from("7"), PatientId::from("8")]).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_flows_on_disjoint_beds_all_succeed() {
    let store = seeded_store(&["A", "B"], 8).await;
    let flow = Arc::new(FlowOrchestrator::new(
        store.clone(),
        EventBroadcaster::new_shared(),
    ));

    let tasks = (1..=8).map(|n| {
        let flow = flow.clone();
        tokio::spawn(async move {
            let patient = PatientId::new(format!("p{n}"));
            let encounter = flow
                .admit(&patient, &BedId::new(format!("A-{n:02}")), now_utc(), Value::Null)
                .await?;
            flow.transfer(&encounter.id, &BedId::new(format!("B-{n:02}")), "overflow")
                .await?;
            flow.discharge(&encounter.id, now_utc(), DischargeMetadata::new())
                .await
        })
    });

    for joined in join_all(tasks).await {
        joined.unwrap().unwrap();
    }

    let occupied = store
        .list_beds(&BedFilter::new().with_status(BedStatus::OCCUPIED))
        .await
        .unwrap();
    assert!(occupied.is_empty());
    assert_eq!(store.transaction_stats().committed, 24);
}

const RACE_TIMEOUT: Duration = Duration::from_secs(30);

/// Admit, transfer and a status toggle all aim at the same free bed. Only the
/// first one to lock it can win.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contested_bed_has_exactly_one_winner() {
    for round in 0..25 {
        let store = seeded_store(&["C"], 2).await;
        let flow = Arc::new(FlowOrchestrator::new(
            store.clone(),
            EventBroadcaster::new_shared(),
        ));
        let (source, target) = (BedId::from("C-01"), BedId::from("C-02"));
        let (first, second) = (PatientId::from("first"), PatientId::from("second"));
        let encounter = flow
            .admit(&first, &source, now_utc(), Value::Null)
            .await
            .unwrap();

        let admit = tokio::spawn({
            let (flow, target, second) = (flow.clone(), target.clone(), second.clone());
            async move {
                flow.admit(&second, &target, now_utc(), Value::Null)
                    .await
                    .map(|_| ())
            }
        });
        let transfer = tokio::spawn({
            let (flow, target, id) = (flow.clone(), target.clone(), encounter.id.clone());
            async move { flow.transfer(&id, &target, "race").await.map(|_| ()) }
        });
        let cleaning = tokio::spawn({
            let (flow, target) = (flow.clone(), target.clone());
            async move {
                flow.set_bed_status(&target, BedStatus::CLEANING)
                    .await
                    .map(|_| ())
            }
        });

        let results = tokio::time::timeout(RACE_TIMEOUT, join_all([admit, transfer, cleaning]))
            .await
            .expect("contested flows did not finish");
        let results: Vec<_> = results.into_iter().map(|joined| joined.unwrap()).collect();

        let winners = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(winners, 1, "round {round}: {results:?}");
        for err in results.iter().filter_map(|result| result.as_ref().err()) {
            assert!(
                matches!(
                    err,
                    FlowError::BedNotAvailable { .. } | FlowError::InvalidTransition { .. }
                ),
                "round {round}: {err}"
            );
        }

        let target_bed = store.get_bed(&target).await.unwrap();
        let source_bed = store.get_bed(&source).await.unwrap();
        match results.iter().position(Result::is_ok) {
            Some(0) => assert!(target_bed.is_occupied() && source_bed.is_occupied()),
            Some(1) => assert!(target_bed.is_occupied() && source_bed.is_available()),
            _ => {
                assert_eq!(target_bed.status, BedStatus::CLEANING);
                assert!(source_bed.is_occupied());
            }
        }
        assert_bijection(&store, &[first, second]).await;
    }
}

/// Discharge never loses to a concurrent transfer of the same encounter, and
/// whichever order they run in, both beds end up free.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transfer_racing_discharge_frees_both_beds() {
    for round in 0..25 {
        let store = seeded_store(&["D"], 2).await;
        let flow = Arc::new(FlowOrchestrator::new(
            store.clone(),
            EventBroadcaster::new_shared(),
        ));
        let (source, target) = (BedId::from("D-01"), BedId::from("D-02"));
        let patient = PatientId::from("p");
        let encounter = flow
            .admit(&patient, &source, now_utc(), Value::Null)
            .await
            .unwrap();

        let transfer = tokio::spawn({
            let (flow, target, id) = (flow.clone(), target.clone(), encounter.id.clone());
            async move { flow.transfer(&id, &target, "race").await }
        });
        let discharge = tokio::spawn({
            let (flow, id) = (flow.clone(), encounter.id.clone());
            async move {
                flow.discharge(&id, now_utc(), DischargeMetadata::new())
                    .await
            }
        });

        let (transferred, discharged) =
            tokio::time::timeout(RACE_TIMEOUT, async { (transfer.await, discharge.await) })
                .await
                .expect("transfer and discharge did not finish");
        let discharged = discharged.unwrap().unwrap();
        match transferred.unwrap() {
            Ok(_) => assert_eq!(discharged.bed_id, target),
            Err(err) => {
                assert!(matches!(err, FlowError::EncounterNotOpen { .. }), "round {round}: {err}");
                assert_eq!(discharged.bed_id, source);
            }
        }

        assert!(store.get_bed(&source).await.unwrap().is_available());
        assert!(store.get_bed(&target).await.unwrap().is_available());
        let stored = store.get_encounter(&encounter.id).await.unwrap();
        assert_eq!(stored.status, EncounterStatus::Discharged);
        assert_bijection(&store, &[patient]).await;
    }
}

/// Eight tasks, one patient each, drive random flows over four shared beds.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_random_flows_keep_bijection() {
    let store = seeded_store(&["E"], 4).await;
    let flow = Arc::new(FlowOrchestrator::new(
        store.clone(),
        EventBroadcaster::new_shared(),
    ));
    let beds: Vec<BedId> = (1..=4).map(|n| BedId::new(format!("E-{n:02}"))).collect();
    let patients: Vec<PatientId> = (0..8).map(|n| PatientId::new(format!("q{n}"))).collect();

    let tasks = patients.iter().cloned().enumerate().map(|(n, patient)| {
        let (flow, beds) = (flow.clone(), beds.clone());
        tokio::spawn(async move {
            let mut rng = fastrand::Rng::with_seed(0xbed0 + n as u64);
            let mut open: Option<EncounterId> = None;
            for _ in 0..60 {
                let bed = &beds[rng.usize(..beds.len())];
                let outcome = match (rng.u8(..4), open.clone()) {
                    (0, None) => flow
                        .admit(&patient, bed, now_utc(), Value::Null)
                        .await
                        .map(|encounter| open = Some(encounter.id)),
                    (1, Some(id)) => flow.transfer(&id, bed, "shuffle").await.map(|_| ()),
                    (2, Some(id)) => flow
                        .discharge(&id, now_utc(), DischargeMetadata::new())
                        .await
                        .map(|_| open = None),
                    _ => {
                        let status = if rng.bool() {
                            BedStatus::CLEANING
                        } else {
                            BedStatus::AVAILABLE
                        };
                        flow.set_bed_status(bed, status).await.map(|_| ())
                    }
                };
                if let Err(err) = outcome {
                    assert!(
                        matches!(
                            err,
                            FlowError::BedNotAvailable { .. }
                                | FlowError::NoOpTransfer { .. }
                                | FlowError::InvalidTransition { .. }
                        ),
                        "{patient}: {err}"
                    );
                }
            }
        })
    });

    tokio::time::timeout(RACE_TIMEOUT, join_all(tasks))
        .await
        .expect("random flows did not finish")
        .into_iter()
        .for_each(|joined| joined.unwrap());

    assert_bijection(&store, &patients).await;
    for patient in &patients {
        let open = store.open_encounter_for_patient(patient).await.unwrap();
        if let Some(encounter) = open {
            assert!(store.get_bed(&encounter.bed_id).await.unwrap().is_occupied());
        }
    }
}
