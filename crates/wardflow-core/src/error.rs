use thiserror::Error;

use crate::vocabulary::VocabularyError;

/// Kind of entity referenced by a failed lookup or registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Bed,
    Ward,
    Encounter,
    Patient,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bed => "Bed",
            Self::Ward => "Ward",
            Self::Encounter => "Encounter",
            Self::Patient => "Patient",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by bed and patient-flow operations.
///
/// Every variant is a recoverable outcome scoped to the single requested
/// operation. Callers are expected to re-read current state and retry with
/// corrected input where that makes sense.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Bed {bed_id} is not available (status: {status})")]
    BedNotAvailable { bed_id: String, status: String },

    #[error("Patient {patient_id} is already admitted under encounter {encounter_id}")]
    PatientAlreadyAdmitted {
        patient_id: String,
        encounter_id: String,
    },

    #[error("Encounter {encounter_id} is not open")]
    EncounterNotOpen { encounter_id: String },

    #[error("Encounter {encounter_id} already occupies bed {bed_id}")]
    NoOpTransfer {
        encounter_id: String,
        bed_id: String,
    },

    #[error("Invalid status transition for bed {bed_id}: {from} -> {to}")]
    InvalidTransition {
        bed_id: String,
        from: String,
        to: String,
    },

    #[error(transparent)]
    InvalidVocabulary(#[from] VocabularyError),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: EntityKind, id: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl FlowError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn bed_not_available(bed_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::BedNotAvailable {
            bed_id: bed_id.into(),
            status: status.into(),
        }
    }

    pub fn patient_already_admitted(
        patient_id: impl Into<String>,
        encounter_id: impl Into<String>,
    ) -> Self {
        Self::PatientAlreadyAdmitted {
            patient_id: patient_id.into(),
            encounter_id: encounter_id.into(),
        }
    }

    pub fn encounter_not_open(encounter_id: impl Into<String>) -> Self {
        Self::EncounterNotOpen {
            encounter_id: encounter_id.into(),
        }
    }

    pub fn no_op_transfer(encounter_id: impl Into<String>, bed_id: impl Into<String>) -> Self {
        Self::NoOpTransfer {
            encounter_id: encounter_id.into(),
            bed_id: bed_id.into(),
        }
    }

    pub fn invalid_transition(
        bed_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            bed_id: bed_id.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn invalid_timestamp(message: impl Into<String>) -> Self {
        Self::InvalidTimestamp(message.into())
    }

    pub fn already_exists(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// True for outcomes caused by the request itself rather than the store.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Configuration(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::BedNotAvailable { .. }
            | Self::PatientAlreadyAdmitted { .. }
            | Self::EncounterNotOpen { .. }
            | Self::NoOpTransfer { .. }
            | Self::InvalidTransition { .. }
            | Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidVocabulary(_) | Self::InvalidTimestamp(_) => ErrorCategory::Validation,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Storage(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Configuration,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Convenience result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = FlowError::not_found(EntityKind::Bed, "A-101");
        assert_eq!(err.to_string(), "Bed not found: A-101");
        assert!(err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_bed_not_available_error() {
        let err = FlowError::bed_not_available("B-05", "occupied");
        assert_eq!(
            err.to_string(),
            "Bed B-05 is not available (status: occupied)"
        );
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = FlowError::invalid_transition("A-101", "available", "occupied");
        assert_eq!(
            err.to_string(),
            "Invalid status transition for bed A-101: available -> occupied"
        );
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_storage_error_is_not_client_error() {
        let err = FlowError::storage("lock order violated");
        assert!(!err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::Internal);
        assert_eq!(err.category().to_string(), "internal");
    }
}
