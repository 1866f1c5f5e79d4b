use uuid::Uuid;

// Pipeline entities
pub mod attendees;
pub mod insight_records;
pub mod sessions;

// Lifecycle and tracking enums
pub mod delivery_outcome;
pub mod failure_kind;
pub mod pipeline_stage;
pub mod session_state;

// Typed JSON columns
pub mod lists;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;
