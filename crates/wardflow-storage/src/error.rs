//! Storage error types for the bed registry and encounter ledger.

use wardflow_core::{EntityKind, ErrorCategory, FlowError, VocabularyError};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The kind of entity that was not found.
        kind: EntityKind,
        /// The ID of the entity that was not found.
        id: String,
    },

    /// Attempted to register an entity that already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// The kind of entity that already exists.
        kind: EntityKind,
        /// The conflicting identifier.
        id: String,
    },

    /// The patient already has an open encounter.
    #[error("Patient {patient_id} already has open encounter {encounter_id}")]
    DuplicateAdmission {
        patient_id: String,
        encounter_id: String,
    },

    /// A write targeted an encounter that is no longer open.
    #[error("Encounter {encounter_id} is not open")]
    EncounterNotOpen { encounter_id: String },

    /// A direct status change tried to enter or leave `occupied`.
    #[error("Invalid status transition for bed {bed_id}: {from} -> {to}")]
    InvalidTransition {
        bed_id: String,
        from: String,
        to: String,
    },

    /// A bed type or status outside the configured vocabulary.
    #[error(transparent)]
    InvalidVocabulary(#[from] VocabularyError),

    /// An error occurred during a transaction.
    #[error("Transaction error: {message}")]
    TransactionError {
        /// Description of the transaction error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    /// Creates a new `DuplicateAdmission` error.
    #[must_use]
    pub fn duplicate_admission(
        patient_id: impl Into<String>,
        encounter_id: impl Into<String>,
    ) -> Self {
        Self::DuplicateAdmission {
            patient_id: patient_id.into(),
            encounter_id: encounter_id.into(),
        }
    }

    /// Creates a new `EncounterNotOpen` error.
    #[must_use]
    pub fn encounter_not_open(encounter_id: impl Into<String>) -> Self {
        Self::EncounterNotOpen {
            encounter_id: encounter_id.into(),
        }
    }

    /// Creates a new `InvalidTransition` error.
    #[must_use]
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

    /// Creates a new `TransactionError` error.
    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. }
            | Self::DuplicateAdmission { .. }
            | Self::EncounterNotOpen { .. }
            | Self::InvalidTransition { .. } => ErrorCategory::Conflict,
            Self::InvalidVocabulary(_) => ErrorCategory::Validation,
            Self::TransactionError { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<StorageError> for FlowError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => FlowError::not_found(kind, id),
            StorageError::AlreadyExists { kind, id } => FlowError::already_exists(kind, id),
            StorageError::DuplicateAdmission {
                patient_id,
                encounter_id,
            } => FlowError::patient_already_admitted(patient_id, encounter_id),
            StorageError::EncounterNotOpen { encounter_id } => {
                FlowError::encounter_not_open(encounter_id)
            }
            StorageError::InvalidTransition { bed_id, from, to } => {
                FlowError::invalid_transition(bed_id, from, to)
            }
            StorageError::InvalidVocabulary(e) => FlowError::InvalidVocabulary(e),
            other @ StorageError::TransactionError { .. } => FlowError::storage(other.to_string()),
        }
    }
}
