use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use wardflow_core::events::broadcaster::DEFAULT_BUFFER_SIZE;
use wardflow_core::{BedStatus, Vocabulary};
use wardflow_db_memory::StorageBackend;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Extensions to the baseline bed type and status sets
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Ward and bed layout seeded at startup
    #[serde(default)]
    pub wards: Vec<WardConfig>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        self.storage.backend()?;
        if self.storage.event_buffer == 0 {
            return Err("storage.event_buffer must be > 0".into());
        }
        // Layout validation
        let vocabulary = self.vocabulary();
        let mut ward_ids = HashSet::new();
        let mut bed_ids = HashSet::new();
        for ward in &self.wards {
            if ward.id.trim().is_empty() {
                return Err("wards.id must not be empty".into());
            }
            if !ward_ids.insert(ward.id.as_str()) {
                return Err(format!("duplicate ward id '{}'", ward.id));
            }
            let mut numbers = HashSet::new();
            for bed in &ward.beds {
                if bed.number.trim().is_empty() {
                    return Err(format!("ward '{}' has a bed without a number", ward.id));
                }
                if !numbers.insert(bed.number.as_str()) {
                    return Err(format!(
                        "duplicate bed number '{}' in ward '{}'",
                        bed.number, ward.id
                    ));
                }
                let bed_id = bed.bed_id(&ward.id);
                if !bed_ids.insert(bed_id.clone()) {
                    return Err(format!("duplicate bed id '{bed_id}'"));
                }
                vocabulary
                    .bed_type(&bed.bed_type)
                    .map_err(|e| format!("bed '{bed_id}': {e}"))?;
                if let Some(status) = &bed.status {
                    let status = vocabulary
                        .bed_status(status)
                        .map_err(|e| format!("bed '{bed_id}': {e}"))?;
                    if status == BedStatus::OCCUPIED {
                        return Err(format!(
                            "bed '{bed_id}' cannot start occupied; admit a patient instead"
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Baseline vocabulary extended with the configured values.
    pub fn vocabulary(&self) -> Vocabulary {
        Vocabulary::baseline()
            .with_bed_types(&self.vocabulary.bed_types)
            .with_bed_statuses(&self.vocabulary.bed_statuses)
    }

    pub fn bed_count(&self) -> usize {
        self.wards.iter().map(|ward| ward.beds.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VocabularyConfig {
    #[serde(default)]
    pub bed_types: Vec<String>,
    #[serde(default)]
    pub bed_statuses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Capacity of the flow event broadcast channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}
fn default_backend() -> String {
    "memory".into()
}
fn default_event_buffer() -> usize {
    DEFAULT_BUFFER_SIZE
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl StorageConfig {
    pub fn backend(&self) -> Result<StorageBackend, String> {
        StorageBackend::from_str(&self.backend).map_err(|e| format!("storage.backend: {e}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardConfig {
    pub id: String,
    /// Display name; defaults to the ward id
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub beds: Vec<BedConfig>,
}

impl WardConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedConfig {
    /// Hospital-unique id; defaults to `<ward>-<number>`
    #[serde(default)]
    pub id: Option<String>,
    pub number: String,
    #[serde(default = "default_bed_type")]
    pub bed_type: String,
    /// Initial status; `available` when unset
    #[serde(default)]
    pub status: Option<String>,
}
fn default_bed_type() -> String {
    "general".into()
}

impl BedConfig {
    pub fn bed_id(&self, ward_id: &str) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{ward_id}-{}", self.number))
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("wardflow.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., WARDFLOW__LOGGING__LEVEL=debug
        builder = builder.add_source(
            Environment::with_prefix("WARDFLOW")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
