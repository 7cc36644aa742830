//! Patient-flow orchestration over a [`wardflow_storage::FlowStore`].
//!
//! - [`FlowOrchestrator`]: admit, transfer, discharge and direct bed status
//!   toggles, each one atomic store transaction.
//! - [`WardAggregator`]: per-ward and hospital-wide occupancy, computed on
//!   every call from the bed registry.
//! - [`AvailabilityFinder`]: beds eligible as admission or transfer targets.

pub mod aggregator;
pub mod finder;
pub mod orchestrator;

pub use aggregator::{HOSPITAL_WARD_ID, WardAggregator, WardStats, occupancy_rate};
pub use finder::AvailabilityFinder;
pub use orchestrator::FlowOrchestrator;
