//! Query and transaction types shared by storage backends.

use serde::{Deserialize, Serialize};
use wardflow_core::{Bed, BedId, BedStatus, BedType, EncounterId, PatientId, WardId};

/// Filter for bed listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BedFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ward_id: Option<WardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed_type: Option<BedType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BedStatus>,
}

impl BedFilter {
    /// Creates a filter that matches every bed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ward(mut self, ward_id: impl Into<WardId>) -> Self {
        self.ward_id = Some(ward_id.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, bed_type: BedType) -> Self {
        self.bed_type = Some(bed_type);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: BedStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns `true` if the bed satisfies every set criterion.
    pub fn matches(&self, bed: &Bed) -> bool {
        self.ward_id.as_ref().is_none_or(|w| *w == bed.ward_id)
            && self.bed_type.as_ref().is_none_or(|t| *t == bed.bed_type)
            && self.status.as_ref().is_none_or(|s| *s == bed.status)
    }
}

/// Row lock identity.
///
/// The derived ordering (patients, then encounters, then beds, each by id) is
/// the global acquisition order; transactions must take locks in ascending
/// order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Patient(PatientId),
    Encounter(EncounterId),
    Bed(BedId),
}

impl LockKey {
    pub fn patient(id: &PatientId) -> Self {
        Self::Patient(id.clone())
    }

    pub fn encounter(id: &EncounterId) -> Self {
        Self::Encounter(id.clone())
    }

    pub fn bed(id: &BedId) -> Self {
        Self::Bed(id.clone())
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Patient(id) => write!(f, "patient:{id}"),
            Self::Encounter(id) => write!(f, "encounter:{id}"),
            Self::Bed(id) => write!(f, "bed:{id}"),
        }
    }
}

/// Lifecycle of a store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Counters of finished transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStats {
    pub committed: u64,
    pub rolled_back: u64,
}

impl TransactionStats {
    pub fn total(&self) -> u64 {
        self.committed + self.rolled_back
    }
}
