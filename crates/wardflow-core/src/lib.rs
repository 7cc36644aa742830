pub mod error;
pub mod events;
pub mod id;
pub mod model;
pub mod time;
pub mod vocabulary;

pub use error::{EntityKind, ErrorCategory, FlowError, Result};
pub use events::{EventBroadcaster, FlowEvent, FlowEventType};
pub use id::generate_id;
pub use model::{
    Bed, BedId, DischargeMetadata, Encounter, EncounterEvent, EncounterId, EncounterStatus,
    PatientId, Ward, WardId,
};
pub use time::{Timestamp, now_utc};
pub use vocabulary::{BedStatus, BedType, Vocabulary, VocabularyError};
