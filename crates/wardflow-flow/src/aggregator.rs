//! Ward occupancy statistics, recomputed from the bed registry on each call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wardflow_core::{Bed, BedStatus, Result, Ward, WardId};
use wardflow_storage::{BedFilter, BedRegistry, DynFlowStore};

/// Ward id used for the hospital-wide total.
pub const HOSPITAL_WARD_ID: &str = "*";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardStats {
    pub ward_id: WardId,
    pub ward_name: String,
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
    pub maintenance: usize,
    pub cleaning: usize,
    /// Beds in a configured status outside the baseline set.
    pub other: usize,
    /// Percentage of occupied beds, two decimals.
    pub occupancy_rate: f64,
}

impl WardStats {
    fn empty(ward_id: WardId, ward_name: String) -> Self {
        Self {
            ward_id,
            ward_name,
            total: 0,
            occupied: 0,
            available: 0,
            maintenance: 0,
            cleaning: 0,
            other: 0,
            occupancy_rate: 0.0,
        }
    }

    fn count(&mut self, bed: &Bed) {
        self.total += 1;
        match &bed.status {
            s if *s == BedStatus::OCCUPIED => self.occupied += 1,
            s if *s == BedStatus::AVAILABLE => self.available += 1,
            s if *s == BedStatus::MAINTENANCE => self.maintenance += 1,
            s if *s == BedStatus::CLEANING => self.cleaning += 1,
            _ => self.other += 1,
        }
    }

    fn finish(mut self) -> Self {
        self.occupancy_rate = occupancy_rate(self.occupied, self.total);
        self
    }
}

/// `occupied / total` as a percentage rounded to two decimals; `0` for an
/// empty ward.
pub fn occupancy_rate(occupied: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = occupied as f64 * 100.0 / total as f64;
    (rate * 100.0).round() / 100.0
}

pub struct WardAggregator {
    store: DynFlowStore,
}

impl WardAggregator {
    pub fn new(store: DynFlowStore) -> Self {
        Self { store }
    }

    /// Statistics for one ward, or for every registered ward ordered by id.
    ///
    /// Wards without beds are reported with zero counts.
    pub async fn ward_stats(&self, ward_id: Option<&WardId>) -> Result<Vec<WardStats>> {
        let wards: Vec<Ward> = match ward_id {
            Some(id) => vec![self.store.get_ward(id).await?],
            None => self.store.list_wards().await?,
        };
        let filter = match ward_id {
            Some(id) => BedFilter::new().with_ward(id.clone()),
            None => BedFilter::new(),
        };
        let beds = self.store.list_beds(&filter).await?;

        let mut stats: BTreeMap<WardId, WardStats> = wards
            .into_iter()
            .map(|ward| (ward.id.clone(), WardStats::empty(ward.id, ward.name)))
            .collect();
        for bed in &beds {
            if let Some(entry) = stats.get_mut(&bed.ward_id) {
                entry.count(bed);
            }
        }

        Ok(stats.into_values().map(WardStats::finish).collect())
    }

    /// Totals across all wards, reported under ward id `*`.
    pub async fn hospital_stats(&self) -> Result<WardStats> {
        let beds = self.store.list_beds(&BedFilter::new()).await?;
        let mut total = WardStats::empty(WardId::from(HOSPITAL_WARD_ID), "Hospital".to_string());
        for bed in &beds {
            total.count(bed);
        }
        Ok(total.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wardflow_core::{BedType, FlowError, Vocabulary};
    use wardflow_db_memory::InMemoryStore;

    #[test]
    fn test_occupancy_rate() {
        assert_eq!(occupancy_rate(0, 0), 0.0);
        assert_eq!(occupancy_rate(4, 10), 40.0);
        assert_eq!(occupancy_rate(1, 3), 33.33);
        assert_eq!(occupancy_rate(2, 3), 66.67);
        assert_eq!(occupancy_rate(5, 5), 100.0);
    }

    #[tokio::test]
    async fn test_ward_stats_counts_statuses() {
        let vocabulary = Vocabulary::baseline().with_bed_statuses(["reserved"]);
        let store = InMemoryStore::with_vocabulary(Arc::new(vocabulary));
        store.register_ward(Ward::new("A", "Acute")).await.unwrap();
        store.register_ward(Ward::new("E", "Empty")).await.unwrap();
        let statuses = [
            BedStatus::AVAILABLE,
            BedStatus::AVAILABLE,
            BedStatus::MAINTENANCE,
            BedStatus::CLEANING,
            BedStatus::new("reserved"),
        ];
        for (n, status) in statuses.into_iter().enumerate() {
            store
                .register_bed(
                    Bed::new(format!("A-{n}"), "A", n.to_string(), BedType::GENERAL)
                        .with_status(status),
                )
                .await
                .unwrap();
        }
        let aggregator = WardAggregator::new(Arc::new(store));

        let stats = aggregator.ward_stats(None).await.unwrap();
        assert_eq!(stats.len(), 2);
        let acute = &stats[0];
        assert_eq!(acute.ward_id.as_str(), "A");
        assert_eq!(acute.total, 5);
        assert_eq!(acute.available, 2);
        assert_eq!(acute.maintenance, 1);
        assert_eq!(acute.cleaning, 1);
        assert_eq!(acute.other, 1);
        assert_eq!(acute.occupancy_rate, 0.0);

        let empty = &stats[1];
        assert_eq!(empty.ward_name, "Empty");
        assert_eq!(empty.total, 0);
        assert_eq!(empty.occupancy_rate, 0.0);

        let hospital = aggregator.hospital_stats().await.unwrap();
        assert_eq!(hospital.ward_id.as_str(), HOSPITAL_WARD_ID);
        assert_eq!(hospital.total, 5);
    }

    #[tokio::test]
    async fn test_unknown_ward_is_not_found() {
        let aggregator = WardAggregator::new(Arc::new(InMemoryStore::new()));
        let err = aggregator
            .ward_stats(Some(&WardId::from("Z")))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
    }
}
