//! WardFlow: hospital bed lifecycle and patient-flow core.
//!
//! This crate assembles the pieces from an [`AppConfig`]: a store for the
//! configured backend, the bed vocabulary, the flow event broadcaster, and the
//! orchestrator, aggregator and finder on top of them.
//!
//! ```ignore
//! let cfg = wardflow::config::loader::load_config(Some("wardflow.toml"))?;
//! wardflow::observability::init_tracing_with_level(&cfg.logging.level);
//! let hospital = wardflow::WardFlow::from_config(&cfg).await?;
//! let encounter = hospital
//!     .orchestrator()
//!     .admit(&"42".into(), &"A-101".into(), now_utc(), Value::Null)
//!     .await?;
//! ```

pub mod bootstrap;
pub mod config;
pub mod observability;

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

pub use bootstrap::{SeedStats, seed_layout};
pub use config::AppConfig;
pub use wardflow_core::{FlowError, FlowEvent, Result};
pub use wardflow_flow::{AvailabilityFinder, FlowOrchestrator, WardAggregator, WardStats};

use wardflow_core::{EventBroadcaster, Vocabulary};
use wardflow_db_memory::create_store;
use wardflow_storage::{DynFlowStore, FlowStore};

pub struct WardFlow {
    store: DynFlowStore,
    vocabulary: Arc<Vocabulary>,
    events: Arc<EventBroadcaster>,
    orchestrator: FlowOrchestrator,
    aggregator: WardAggregator,
    finder: AvailabilityFinder,
}

impl WardFlow {
    /// Builds the store for the configured backend and seeds the ward layout.
    ///
    /// The configuration is validated again, so callers that build an
    /// `AppConfig` by hand get the same checks as `load_config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate().map_err(FlowError::configuration)?;
        let backend = config
            .storage
            .backend()
            .map_err(FlowError::configuration)?;
        let vocabulary = Arc::new(config.vocabulary());
        let store = create_store(backend, vocabulary.clone());
        let events = Arc::new(EventBroadcaster::with_capacity(config.storage.event_buffer));

        let hospital = Self::with_store(store, vocabulary, events);
        seed_layout(&hospital.store, config, &hospital.vocabulary).await?;
        info!(
            backend = hospital.store.backend_name(),
            beds = config.bed_count(),
            "WardFlow ready"
        );
        Ok(hospital)
    }

    /// Wires the flow components around an existing store without seeding.
    pub fn with_store(
        store: DynFlowStore,
        vocabulary: Arc<Vocabulary>,
        events: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            orchestrator: FlowOrchestrator::new(store.clone(), events.clone()),
            aggregator: WardAggregator::new(store.clone()),
            finder: AvailabilityFinder::new(store.clone()),
            store,
            vocabulary,
            events,
        }
    }

    pub fn store(&self) -> &DynFlowStore {
        &self.store
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn orchestrator(&self) -> &FlowOrchestrator {
        &self.orchestrator
    }

    pub fn aggregator(&self) -> &WardAggregator {
        &self.aggregator
    }

    pub fn finder(&self) -> &AvailabilityFinder {
        &self.finder
    }

    /// Subscribes to committed flow events.
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }
}
