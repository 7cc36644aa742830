//! Open-vocabulary bed types and statuses.
//!
//! Hospitals add their own bed types (e.g. `bariatric`) and holding statuses
//! (e.g. `reserved`), so neither is a closed enum. Values are lowercase string
//! newtypes checked against a [`Vocabulary`] allow-list built from the baseline
//! sets plus configuration.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub const BASELINE_BED_TYPES: [&str; 4] = ["general", "private", "icu", "pediatric"];
pub const BASELINE_BED_STATUSES: [&str; 4] = ["available", "occupied", "maintenance", "cleaning"];

/// A value rejected by the configured allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {vocabulary} '{value}'")]
pub struct VocabularyError {
    pub vocabulary: &'static str,
    pub value: String,
}

/// Kind of bed (general, private, icu, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BedType(Cow<'static, str>);

impl BedType {
    pub const GENERAL: BedType = BedType(Cow::Borrowed("general"));
    pub const PRIVATE: BedType = BedType(Cow::Borrowed("private"));
    pub const ICU: BedType = BedType(Cow::Borrowed("icu"));
    pub const PEDIATRIC: BedType = BedType(Cow::Borrowed("pediatric"));

    /// Builds an unchecked value; use [`Vocabulary::bed_type`] for user input.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Cow::Owned(normalize(&value.into())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a physical bed.
///
/// `occupied` is special: it is entered and left only by admit, transfer and
/// discharge. Every other status is a parallel state toggled directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BedStatus(Cow<'static, str>);

impl BedStatus {
    pub const AVAILABLE: BedStatus = BedStatus(Cow::Borrowed("available"));
    pub const OCCUPIED: BedStatus = BedStatus(Cow::Borrowed("occupied"));
    pub const MAINTENANCE: BedStatus = BedStatus(Cow::Borrowed("maintenance"));
    pub const CLEANING: BedStatus = BedStatus(Cow::Borrowed("cleaning"));

    /// Builds an unchecked value; use [`Vocabulary::bed_status`] for user input.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Cow::Owned(normalize(&value.into())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_available(&self) -> bool {
        *self == Self::AVAILABLE
    }

    pub fn is_occupied(&self) -> bool {
        *self == Self::OCCUPIED
    }
}

impl fmt::Display for BedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Allow-list of bed types and statuses accepted by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    bed_types: BTreeSet<String>,
    bed_statuses: BTreeSet<String>,
}

impl Vocabulary {
    /// The baseline sets with no hospital-specific additions.
    pub fn baseline() -> Self {
        Self {
            bed_types: BASELINE_BED_TYPES.iter().map(|s| s.to_string()).collect(),
            bed_statuses: BASELINE_BED_STATUSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_bed_types<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.bed_types.extend(
            extra
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty()),
        );
        self
    }

    pub fn with_bed_statuses<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.bed_statuses.extend(
            extra
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty()),
        );
        self
    }

    /// Parses and validates a bed type.
    pub fn bed_type(&self, raw: &str) -> Result<BedType, VocabularyError> {
        let value = BedType::new(raw);
        self.check_bed_type(&value)?;
        Ok(value)
    }

    /// Parses and validates a bed status.
    pub fn bed_status(&self, raw: &str) -> Result<BedStatus, VocabularyError> {
        let value = BedStatus::new(raw);
        self.check_bed_status(&value)?;
        Ok(value)
    }

    pub fn check_bed_type(&self, value: &BedType) -> Result<(), VocabularyError> {
        if self.bed_types.contains(value.as_str()) {
            Ok(())
        } else {
            Err(VocabularyError {
                vocabulary: "bed type",
                value: value.as_str().to_string(),
            })
        }
    }

    pub fn check_bed_status(&self, value: &BedStatus) -> Result<(), VocabularyError> {
        if self.bed_statuses.contains(value.as_str()) {
            Ok(())
        } else {
            Err(VocabularyError {
                vocabulary: "bed status",
                value: value.as_str().to_string(),
            })
        }
    }

    pub fn bed_types(&self) -> impl Iterator<Item = &str> {
        self.bed_types.iter().map(String::as_str)
    }

    pub fn bed_statuses(&self) -> impl Iterator<Item = &str> {
        self.bed_statuses.iter().map(String::as_str)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::baseline()
    }
}
