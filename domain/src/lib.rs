//! Business layer of the meeting synthesis service.
//!
//! Re-exports the entities from `entity_api` so the `web` crate never depends on the
//! persistence crates directly.

pub use entity_api::{
    attendees, delivery_outcome, failure_kind, insight_records, lists, pipeline_stage,
    session_state, sessions, Id,
};

pub use entity_api::attendee::NewAttendee;
pub use entity_api::session::{NewSession, SessionFilter};

pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod pipeline;
pub mod providers;
pub mod render;
pub mod store;
