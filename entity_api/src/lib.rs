pub use entity::{
    attendees, delivery_outcome, failure_kind, insight_records, lists, pipeline_stage,
    session_state, sessions, Id,
};

pub mod attendee;
pub mod error;
pub mod insight_record;
pub mod session;
