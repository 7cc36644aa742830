//! Admission and transfer target lookup.

use wardflow_core::{Bed, BedStatus, BedType, Result, WardId};
use wardflow_storage::{BedFilter, BedRegistry, DynFlowStore};

pub struct AvailabilityFinder {
    store: DynFlowStore,
}

impl AvailabilityFinder {
    pub fn new(store: DynFlowStore) -> Self {
        Self { store }
    }

    /// Beds in status `available`, ordered by ward then bed number.
    ///
    /// `exclude_ward` drops one ward from the result, typically the ward a
    /// patient is being transferred out of.
    pub async fn find_available_beds(
        &self,
        exclude_ward: Option<&WardId>,
        bed_type: Option<&BedType>,
    ) -> Result<Vec<Bed>> {
        let mut filter = BedFilter::new().with_status(BedStatus::AVAILABLE);
        if let Some(bed_type) = bed_type {
            filter = filter.with_type(bed_type.clone());
        }
        let beds = self.store.list_beds(&filter).await?;
        Ok(beds
            .into_iter()
            .filter(|bed| exclude_ward.is_none_or(|ward| bed.ward_id != *ward))
            .collect())
    }

    pub async fn count_available(&self, bed_type: Option<&BedType>) -> Result<usize> {
        Ok(self.find_available_beds(None, bed_type).await?.len())
    }
}
