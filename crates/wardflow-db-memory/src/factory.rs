use std::str::FromStr;
use std::sync::Arc;

use wardflow_core::{FlowError, Vocabulary};
use wardflow_storage::DynFlowStore;

use crate::InMemoryStore;

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// In-memory storage implemented on top of papaya::HashMap
    #[default]
    InMemoryPapaya,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InMemoryPapaya => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "papaya" => Ok(Self::InMemoryPapaya),
            other => Err(FlowError::configuration(format!(
                "unsupported storage backend '{other}'"
            ))),
        }
    }
}

/// Create a store for the given backend.
///
/// For now, only the in-memory papaya backend is supported.
pub fn create_store(backend: StorageBackend, vocabulary: Arc<Vocabulary>) -> DynFlowStore {
    match backend {
        StorageBackend::InMemoryPapaya => Arc::new(InMemoryStore::with_vocabulary(vocabulary)),
    }
}
