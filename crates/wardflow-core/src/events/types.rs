use serde::{Deserialize, Serialize};

use crate::model::{BedId, EncounterId, PatientId, WardId};
use crate::time::Timestamp;
use crate::vocabulary::BedStatus;

/// Type of flow event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowEventType {
    Admitted,
    Transferred,
    Discharged,
    BedStatusChanged,
}

impl FlowEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowEventType::Admitted => "admitted",
            FlowEventType::Transferred => "transferred",
            FlowEventType::Discharged => "discharged",
            FlowEventType::BedStatusChanged => "bed_status_changed",
        }
    }
}

impl std::fmt::Display for FlowEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A committed change to bed occupancy or status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    Admitted {
        encounter_id: EncounterId,
        patient_id: PatientId,
        bed_id: BedId,
        ward_id: WardId,
        timestamp: Timestamp,
    },
    Transferred {
        encounter_id: EncounterId,
        patient_id: PatientId,
        from_bed_id: BedId,
        to_bed_id: BedId,
        timestamp: Timestamp,
    },
    Discharged {
        encounter_id: EncounterId,
        patient_id: PatientId,
        bed_id: BedId,
        timestamp: Timestamp,
    },
    BedStatusChanged {
        bed_id: BedId,
        ward_id: WardId,
        status: BedStatus,
        timestamp: Timestamp,
    },
}

impl FlowEvent {
    pub fn event_type(&self) -> FlowEventType {
        match self {
            Self::Admitted { .. } => FlowEventType::Admitted,
            Self::Transferred { .. } => FlowEventType::Transferred,
            Self::Discharged { .. } => FlowEventType::Discharged,
            Self::BedStatusChanged { .. } => FlowEventType::BedStatusChanged,
        }
    }

    /// Beds whose status changed as part of this event.
    pub fn affected_beds(&self) -> Vec<&BedId> {
        match self {
            Self::Admitted { bed_id, .. }
            | Self::Discharged { bed_id, .. }
            | Self::BedStatusChanged { bed_id, .. } => vec![bed_id],
            Self::Transferred {
                from_bed_id,
                to_bed_id,
                ..
            } => vec![from_bed_id, to_bed_id],
        }
    }

    pub fn encounter_id(&self) -> Option<&EncounterId> {
        match self {
            Self::Admitted { encounter_id, .. }
            | Self::Transferred { encounter_id, .. }
            | Self::Discharged { encounter_id, .. } => Some(encounter_id),
            Self::BedStatusChanged { .. } => None,
        }
    }
}
