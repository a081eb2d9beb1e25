//! VIVARIUM Core - Entity Types
//!
//! Pure data structures and protocol date arithmetic. All other crates
//! depend on this. No storage access and no side effects live here.

use uuid::Uuid;

pub mod anchors;
pub mod entities;
pub mod enums;
pub mod error;
pub mod protocol;

pub use anchors::TimelineAnchors;
pub use entities::{Animal, Cohort, ColonyResult, ExperimentRecord, StepKey, Timepoint};
pub use enums::{AnimalStatus, EegImplantTiming, ExperimentStatus, ExperimentType};
pub use error::{ScheduleError, ScheduleResult, StoreError, StoreResult, VivariumError, VivariumResult};
pub use protocol::{ProtocolConfig, ProtocolStep};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation
/// time; the paginated scan in the storage layer relies on this ordering.
pub type EntityId = Uuid;

pub type AnimalId = Uuid;
pub type CohortId = Uuid;
pub type TimepointId = Uuid;
pub type ExperimentId = Uuid;
pub type ResultId = Uuid;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
