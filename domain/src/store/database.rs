use super::{CasOutcome, RecordStore};
use crate::error::Error;
use crate::lifecycle::Lifecycle;
use crate::{attendees, insight_records, sessions, Id};
use async_trait::async_trait;
use entity_api::attendee::{self, NewAttendee};
use entity_api::session::{self, NewSession, SessionFilter, Transition};
use entity_api::insight_record;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Postgres-backed store; the compare-and-set runs as a conditional `UPDATE`.
#[derive(Clone)]
pub struct DatabaseStore {
    db: Arc<DatabaseConnection>,
}

impl DatabaseStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for DatabaseStore {
    async fn get(&self, id: Id) -> Result<sessions::Model, Error> {
        Ok(session::find_by_id(&self.db, id).await?)
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<sessions::Model>, Error> {
        Ok(session::find_by(&self.db, filter).await?)
    }

    async fn create_session(
        &self,
        new_session: NewSession,
        new_attendees: Vec<NewAttendee>,
    ) -> Result<(sessions::Model, Vec<attendees::Model>), Error> {
        Ok(session::create(&self.db, new_session, new_attendees).await?)
    }

    async fn cas_transition(
        &self,
        id: Id,
        expected: Lifecycle,
        transition: Transition,
    ) -> Result<CasOutcome, Error> {
        let applied = session::transition(
            &self.db,
            id,
            expected.state,
            expected.failed_stage,
            transition,
        )
        .await?;

        Ok(match applied {
            Some(session) => CasOutcome::Applied(session),
            None => CasOutcome::Conflict,
        })
    }

    async fn attendees(&self, id: Id) -> Result<Vec<attendees::Model>, Error> {
        Ok(attendee::find_by_session_id(&self.db, id).await?)
    }

    async fn add_attendee(
        &self,
        id: Id,
        new_attendee: NewAttendee,
    ) -> Result<attendees::Model, Error> {
        let session = session::find_by_id(&self.db, id).await?;
        Ok(attendee::create(&self.db, session.id, new_attendee).await?)
    }

    async fn insight(&self, id: Id) -> Result<Option<insight_records::Model>, Error> {
        Ok(insight_record::find_by_session_id(&self.db, id).await?)
    }

    async fn delete(&self, id: Id) -> Result<(), Error> {
        Ok(session::delete_by_id(&self.db, id).await?)
    }
}
