//! Seeds the configured ward and bed layout into a store.
//!
//! Seeding is idempotent: wards and beds that are already registered are
//! skipped with a warning, so a restart against a persistent backend does not
//! fail on its own layout.

use tracing::{info, warn};
use wardflow_core::{Bed, Result, Vocabulary, Ward};
use wardflow_storage::{BedRegistry, DynFlowStore};

use crate::config::AppConfig;

/// Statistics about a layout seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedStats {
    pub wards: usize,
    pub beds: usize,
    pub skipped: usize,
}

impl SeedStats {
    /// Returns the number of entities registered.
    pub fn total(&self) -> usize {
        self.wards + self.beds
    }
}

/// Registers every configured ward and bed.
///
/// # Errors
///
/// Returns `InvalidVocabulary` for bed types or statuses outside `vocabulary`
/// and any registration failure other than an existing entity.
pub async fn seed_layout(
    store: &DynFlowStore,
    config: &AppConfig,
    vocabulary: &Vocabulary,
) -> Result<SeedStats> {
    let mut stats = SeedStats::default();

    for ward_cfg in &config.wards {
        match store
            .register_ward(Ward::new(ward_cfg.id.as_str(), ward_cfg.display_name()))
            .await
        {
            Ok(_) => stats.wards += 1,
            Err(e) if e.is_already_exists() => {
                warn!(ward_id = %ward_cfg.id, "Ward already registered, skipping");
                stats.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }

        for bed_cfg in &ward_cfg.beds {
            let bed_id = bed_cfg.bed_id(&ward_cfg.id);
            let mut bed = Bed::new(
                bed_id.as_str(),
                ward_cfg.id.as_str(),
                bed_cfg.number.as_str(),
                vocabulary.bed_type(&bed_cfg.bed_type)?,
            );
            if let Some(status) = &bed_cfg.status {
                bed = bed.with_status(vocabulary.bed_status(status)?);
            }
            match store.register_bed(bed).await {
                Ok(_) => stats.beds += 1,
                Err(e) if e.is_already_exists() => {
                    warn!(
                        bed_id = %bed_id,
                        ward_id = %ward_cfg.id,
                        "Bed already registered, skipping"
                    );
                    stats.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    info!(
        wards = stats.wards,
        beds = stats.beds,
        skipped = stats.skipped,
        "Seeded ward layout"
    );
    Ok(stats)
}
