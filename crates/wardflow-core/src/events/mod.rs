//! Flow events published after committed bed and encounter changes.
//!
//! Census boards and ward dashboards subscribe to refresh their view; the
//! events are notifications only and carry no authority over state.

pub mod broadcaster;
pub mod types;

pub use broadcaster::EventBroadcaster;
pub use types::{FlowEvent, FlowEventType};
