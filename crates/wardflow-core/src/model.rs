//! Beds, wards and encounters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::id::generate_id;
use crate::time::Timestamp;
use crate::vocabulary::{BedStatus, BedType};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Hospital-unique bed identifier, e.g. `A-101`.
    BedId
);
string_id!(WardId);
string_id!(
    /// Opaque patient identifier owned by the patient directory.
    PatientId
);
string_id!(EncounterId);

impl EncounterId {
    pub fn generate() -> Self {
        Self(generate_id())
    }
}

/// A physical bed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    pub id: BedId,
    pub ward_id: WardId,
    /// Bed number, unique within the ward.
    pub number: String,
    pub bed_type: BedType,
    pub status: BedStatus,
    pub updated_at: Timestamp,
}

impl Bed {
    /// A new bed in the `available` status.
    pub fn new(
        id: impl Into<BedId>,
        ward_id: impl Into<WardId>,
        number: impl Into<String>,
        bed_type: BedType,
    ) -> Self {
        Self {
            id: id.into(),
            ward_id: ward_id.into(),
            number: number.into(),
            bed_type,
            status: BedStatus::AVAILABLE,
            updated_at: crate::time::now_utc(),
        }
    }

    pub fn with_status(mut self, status: BedStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_available(&self) -> bool {
        self.status.is_available()
    }

    pub fn is_occupied(&self) -> bool {
        self.status.is_occupied()
    }
}

/// A grouping of beds. Occupancy figures are derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    pub id: WardId,
    pub name: String,
}

impl Ward {
    pub fn new(id: impl Into<WardId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncounterStatus {
    Open,
    Discharged,
}

impl EncounterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Discharged => "discharged",
        }
    }
}

impl fmt::Display for EncounterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit payload captured at discharge. Stored as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DischargeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
}

impl DischargeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, discharge_type: impl Into<String>) -> Self {
        self.discharge_type = Some(discharge_type.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_follow_up(mut self, follow_up: impl Into<String>) -> Self {
        self.follow_up = Some(follow_up.into());
        self
    }
}

/// One entry in an encounter's movement history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EncounterEvent {
    Admitted {
        bed_id: BedId,
        at: Timestamp,
    },
    Transferred {
        from_bed_id: BedId,
        to_bed_id: BedId,
        at: Timestamp,
        reason: String,
    },
    Discharged {
        bed_id: BedId,
        at: Timestamp,
    },
}

impl EncounterEvent {
    pub fn at(&self) -> Timestamp {
        match self {
            Self::Admitted { at, .. }
            | Self::Transferred { at, .. }
            | Self::Discharged { at, .. } => *at,
        }
    }
}

/// One inpatient admission episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub patient_id: PatientId,
    /// Current bed while open; last occupied bed once discharged.
    pub bed_id: BedId,
    pub status: EncounterStatus,
    pub admitted_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharged_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub clinical_metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge: Option<DischargeMetadata>,
    #[serde(default)]
    pub history: Vec<EncounterEvent>,
}

impl Encounter {
    /// Opens a new encounter with an `Admitted` history entry.
    pub fn open(
        patient_id: PatientId,
        bed_id: BedId,
        admitted_at: Timestamp,
        clinical_metadata: Value,
    ) -> Self {
        Self {
            id: EncounterId::generate(),
            history: vec![EncounterEvent::Admitted {
                bed_id: bed_id.clone(),
                at: admitted_at,
            }],
            patient_id,
            bed_id,
            status: EncounterStatus::Open,
            admitted_at,
            discharged_at: None,
            clinical_metadata,
            discharge: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == EncounterStatus::Open
    }

    /// Beds this encounter has occupied, in order, without repeats of
    /// consecutive entries.
    pub fn bed_trail(&self) -> Vec<&BedId> {
        let mut trail: Vec<&BedId> = Vec::new();
        for event in &self.history {
            let bed = match event {
                EncounterEvent::Admitted { bed_id, .. } => bed_id,
                EncounterEvent::Transferred { to_bed_id, .. } => to_bed_id,
                EncounterEvent::Discharged { .. } => continue,
            };
            if trail.last() != Some(&bed) {
                trail.push(bed);
            }
        }
        trail
    }
}
