use super::{CasOutcome, RecordStore};
use crate::error::Error;
use crate::lifecycle::Lifecycle;
use crate::{attendees, insight_records, sessions, Id};
use async_trait::async_trait;
use entity::lists::TextList;
use entity::session_state::SessionState;
use entity_api::attendee::NewAttendee;
use entity_api::insight_record::NewInsight;
use entity_api::session::{InsightChange, NewSession, SessionFilter, Transition};
use log::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Process-local store. One mutex guards every table, which makes each
/// compare-and-set trivially atomic.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<Id, sessions::Model>,
    attendees: HashMap<Id, Vec<attendees::Model>>,
    insights: HashMap<Id, insight_records::Model>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

fn attendee_model(session_id: Id, new_attendee: NewAttendee) -> attendees::Model {
    let now = now();
    attendees::Model {
        id: Id::new_v4(),
        session_id,
        name: new_attendee.name,
        email: new_attendee.email,
        is_organizer: new_attendee.is_organizer,
        created_at: now,
        updated_at: now,
    }
}

/// Builds the stored record, keeping identity of an overwritten one and resetting its
/// delivery tracking.
fn insight_model(
    session_id: Id,
    new_insight: NewInsight,
    existing: Option<&insight_records::Model>,
) -> insight_records::Model {
    let now = now();
    insight_records::Model {
        id: existing.map_or_else(Id::new_v4, |record| record.id),
        session_id,
        summary_word_count: new_insight.summary_word_count(),
        summary: new_insight.summary,
        decisions: new_insight.decisions,
        action_items: new_insight.action_items,
        open_questions: new_insight.open_questions,
        topics: new_insight.topics,
        extraction_provider: new_insight.extraction_provider,
        extraction_model: new_insight.extraction_model,
        tokens_used: new_insight.tokens_used,
        extraction_seconds: new_insight.extraction_seconds,
        delivered_at: None,
        delivered_recipients: TextList::default(),
        delivery_outcome: None,
        created_at: existing.map_or(now, |record| record.created_at),
        updated_at: now,
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get(&self, id: Id) -> Result<sessions::Model, Error> {
        let tables = self.tables.lock().await;
        tables.sessions.get(&id).cloned().ok_or_else(Error::not_found)
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<sessions::Model>, Error> {
        let tables = self.tables.lock().await;
        let mut sessions: Vec<_> = tables
            .sessions
            .values()
            .filter(|session| filter.matches(session))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            sessions.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(sessions)
    }

    async fn create_session(
        &self,
        new_session: NewSession,
        new_attendees: Vec<NewAttendee>,
    ) -> Result<(sessions::Model, Vec<attendees::Model>), Error> {
        let now = now();
        let session = sessions::Model {
            id: Id::new_v4(),
            title: new_session.title,
            description: new_session.description,
            state: SessionState::Created,
            failed_stage: None,
            transcript: None,
            word_count: None,
            transcription_provider: None,
            audio_duration_seconds: None,
            transcription_seconds: None,
            language: new_session.language,
            last_error_kind: None,
            last_error_message: None,
            created_at: now,
            updated_at: now,
        };
        let attendees: Vec<_> = new_attendees
            .into_iter()
            .map(|new_attendee| attendee_model(session.id, new_attendee))
            .collect();

        let mut tables = self.tables.lock().await;
        tables.sessions.insert(session.id, session.clone());
        tables.attendees.insert(session.id, attendees.clone());

        Ok((session, attendees))
    }

    async fn cas_transition(
        &self,
        id: Id,
        expected: Lifecycle,
        transition: Transition,
    ) -> Result<CasOutcome, Error> {
        let mut tables = self.tables.lock().await;
        let Tables {
            sessions, insights, ..
        } = &mut *tables;

        let session = sessions.get_mut(&id).ok_or_else(Error::not_found)?;
        if Lifecycle::of(session) != expected {
            debug!(
                "Session {id} is {} not {expected}, not moving to {}",
                Lifecycle::of(session),
                transition.state
            );
            return Ok(CasOutcome::Conflict);
        }

        // Validate the insight half before touching the session so a failure writes nothing.
        let record = match &transition.insight {
            Some(InsightChange::Upsert(new_insight)) => Some(insight_model(
                id,
                new_insight.clone(),
                insights.get(&id),
            )),
            Some(InsightChange::Delivery(tracking)) => {
                let mut record = insights.get(&id).cloned().ok_or_else(Error::not_found)?;
                record.delivered_at = Some(tracking.delivered_at);
                record.delivered_recipients = tracking.recipients.clone();
                record.delivery_outcome = Some(tracking.outcome);
                record.updated_at = now();
                Some(record)
            }
            None => None,
        };

        transition.apply(session, now());
        if let Some(record) = record {
            insights.insert(id, record);
        }

        Ok(CasOutcome::Applied(session.clone()))
    }

    async fn attendees(&self, id: Id) -> Result<Vec<attendees::Model>, Error> {
        let tables = self.tables.lock().await;
        let mut attendees = tables.attendees.get(&id).cloned().unwrap_or_default();
        attendees.sort_by(|a, b| {
            b.is_organizer
                .cmp(&a.is_organizer)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(attendees)
    }

    async fn add_attendee(
        &self,
        id: Id,
        new_attendee: NewAttendee,
    ) -> Result<attendees::Model, Error> {
        let mut tables = self.tables.lock().await;
        if !tables.sessions.contains_key(&id) {
            return Err(Error::not_found());
        }
        let attendee = attendee_model(id, new_attendee);
        tables
            .attendees
            .entry(id)
            .or_default()
            .push(attendee.clone());
        Ok(attendee)
    }

    async fn insight(&self, id: Id) -> Result<Option<insight_records::Model>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables.insights.get(&id).cloned())
    }

    async fn delete(&self, id: Id) -> Result<(), Error> {
        let mut tables = self.tables.lock().await;
        tables.sessions.remove(&id).ok_or_else(Error::not_found)?;
        tables.attendees.remove(&id);
        tables.insights.remove(&id);
        Ok(())
    }
}
