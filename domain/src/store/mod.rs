//! Persistence seam of the pipeline.
//!
//! The orchestrator only talks to a [`RecordStore`]. [`DatabaseStore`] keeps records in
//! Postgres through `entity_api`; [`InMemoryStore`] keeps them in process and backs the
//! pipeline tests.

use crate::error::Error;
use crate::lifecycle::Lifecycle;
use crate::{attendees, insight_records, sessions, Id};
use async_trait::async_trait;
use entity_api::attendee::NewAttendee;
use entity_api::session::{NewSession, SessionFilter, Transition};

mod database;
mod memory;

pub use database::DatabaseStore;
pub use memory::InMemoryStore;

/// Result of a conditional lifecycle write.
#[derive(Clone, Debug, PartialEq)]
pub enum CasOutcome {
    /// The stored lifecycle matched and the transition was written as a whole.
    Applied(sessions::Model),
    /// The stored lifecycle changed since it was read; nothing was written.
    Conflict,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns [`crate::error::DomainErrorKind::NotFound`] when the session does not exist.
    async fn get(&self, id: Id) -> Result<sessions::Model, Error>;

    /// Sessions matching `filter`, most recently created first.
    async fn list(&self, filter: &SessionFilter) -> Result<Vec<sessions::Model>, Error>;

    async fn create_session(
        &self,
        new_session: NewSession,
        new_attendees: Vec<NewAttendee>,
    ) -> Result<(sessions::Model, Vec<attendees::Model>), Error>;

    /// Writes `transition` only if the session's stored lifecycle equals `expected`.
    ///
    /// The lifecycle flip, its payload and any insight record change are one atomic write.
    async fn cas_transition(
        &self,
        id: Id,
        expected: Lifecycle,
        transition: Transition,
    ) -> Result<CasOutcome, Error>;

    async fn attendees(&self, id: Id) -> Result<Vec<attendees::Model>, Error>;

    async fn add_attendee(
        &self,
        id: Id,
        new_attendee: NewAttendee,
    ) -> Result<attendees::Model, Error>;

    async fn insight(&self, id: Id) -> Result<Option<insight_records::Model>, Error>;

    /// Removes the session together with its attendees and insight record.
    async fn delete(&self, id: Id) -> Result<(), Error>;
}
