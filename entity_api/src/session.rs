//! Queries for the sessions table, including the compare-and-set lifecycle transition.

use super::error::Error;
use crate::{attendee, insight_record};
use entity::attendees;
use entity::failure_kind::FailureKind;
use entity::pipeline_stage::PipelineStage;
use entity::session_state::SessionState;
use entity::sessions::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    entity::prelude::*, ActiveValue::NotSet, ActiveValue::Set, Condition, DatabaseConnection,
    QueryOrder, QuerySelect, TransactionTrait,
};

/// Descriptive fields of a session supplied by the caller on creation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewSession {
    pub title: String,
    pub description: Option<String>,
    pub language: Option<String>,
}

/// Criteria for listing sessions. Unset fields match every session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionFilter {
    pub state: Option<SessionState>,
    pub failed_stage: Option<PipelineStage>,
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    pub limit: Option<u64>,
}

impl SessionFilter {
    /// Whether `session` passes every criterion except `limit`.
    pub fn matches(&self, session: &Model) -> bool {
        self.state.map_or(true, |state| session.state == state)
            && self
                .failed_stage
                .map_or(true, |stage| session.failed_stage == Some(stage))
            && self.title.as_deref().map_or(true, |title| {
                session
                    .title
                    .to_lowercase()
                    .contains(&title.to_lowercase())
            })
    }
}

/// Output of a successful transcription stage.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptPayload {
    pub text: String,
    pub word_count: i32,
    pub provider: String,
    pub audio_duration_seconds: Option<f64>,
    pub elapsed_seconds: f64,
    pub language: Option<String>,
}

/// What a transition does to the stored failure payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FailureUpdate {
    #[default]
    Keep,
    Clear,
    Record {
        kind: FailureKind,
        message: String,
    },
}

/// Insight record write performed in the same transaction as the state flip.
#[derive(Clone, Debug, PartialEq)]
pub enum InsightChange {
    Upsert(insight_record::NewInsight),
    Delivery(insight_record::DeliveryTracking),
}

/// The new lifecycle value of a session together with the payload written alongside it.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: SessionState,
    pub failed_stage: Option<PipelineStage>,
    pub transcript: Option<TranscriptPayload>,
    pub failure: FailureUpdate,
    pub insight: Option<InsightChange>,
}

impl Transition {
    pub fn to(state: SessionState, failed_stage: Option<PipelineStage>) -> Self {
        Self {
            state,
            failed_stage,
            transcript: None,
            failure: FailureUpdate::Keep,
            insight: None,
        }
    }

    pub fn with_transcript(mut self, transcript: TranscriptPayload) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn clearing_failure(mut self) -> Self {
        self.failure = FailureUpdate::Clear;
        self
    }

    pub fn recording_failure(mut self, kind: FailureKind, message: String) -> Self {
        self.failure = FailureUpdate::Record { kind, message };
        self
    }

    pub fn with_insight(mut self, change: InsightChange) -> Self {
        self.insight = Some(change);
        self
    }

    /// Applies the session half of this transition to an in-memory model.
    pub fn apply(&self, session: &mut Model, now: DateTimeWithTimeZone) {
        session.state = self.state;
        session.failed_stage = self.failed_stage;
        if let Some(transcript) = &self.transcript {
            session.transcript = Some(transcript.text.clone());
            session.word_count = Some(transcript.word_count);
            session.transcription_provider = Some(transcript.provider.clone());
            session.audio_duration_seconds = transcript.audio_duration_seconds;
            session.transcription_seconds = Some(transcript.elapsed_seconds);
            if transcript.language.is_some() {
                session.language = transcript.language.clone();
            }
        }
        match &self.failure {
            FailureUpdate::Keep => {}
            FailureUpdate::Clear => {
                session.last_error_kind = None;
                session.last_error_message = None;
            }
            FailureUpdate::Record { kind, message } => {
                session.last_error_kind = Some(*kind);
                session.last_error_message = Some(message.clone());
            }
        }
        session.updated_at = now;
    }

    fn active_model(&self, now: DateTimeWithTimeZone) -> ActiveModel {
        let mut active_model = ActiveModel {
            state: Set(self.state),
            failed_stage: Set(self.failed_stage),
            updated_at: Set(now),
            ..Default::default()
        };

        if let Some(transcript) = &self.transcript {
            active_model.transcript = Set(Some(transcript.text.clone()));
            active_model.word_count = Set(Some(transcript.word_count));
            active_model.transcription_provider = Set(Some(transcript.provider.clone()));
            active_model.audio_duration_seconds = Set(transcript.audio_duration_seconds);
            active_model.transcription_seconds = Set(Some(transcript.elapsed_seconds));
            if transcript.language.is_some() {
                active_model.language = Set(transcript.language.clone());
            }
        }

        match &self.failure {
            FailureUpdate::Keep => {
                active_model.last_error_kind = NotSet;
                active_model.last_error_message = NotSet;
            }
            FailureUpdate::Clear => {
                active_model.last_error_kind = Set(None);
                active_model.last_error_message = Set(None);
            }
            FailureUpdate::Record { kind, message } => {
                active_model.last_error_kind = Set(Some(*kind));
                active_model.last_error_message = Set(Some(message.clone()));
            }
        }

        active_model
    }
}

/// Creates a session in the `created` state together with its attendees.
pub async fn create(
    db: &DatabaseConnection,
    new_session: NewSession,
    new_attendees: Vec<attendee::NewAttendee>,
) -> Result<(Model, Vec<attendees::Model>), Error> {
    debug!("Creating new session: {}", new_session.title);

    let now = chrono::Utc::now();
    let txn = db.begin().await?;

    let session = ActiveModel {
        title: Set(new_session.title),
        description: Set(new_session.description),
        state: Set(SessionState::Created),
        failed_stage: Set(None),
        language: Set(new_session.language),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut attendees = Vec::with_capacity(new_attendees.len());
    for new_attendee in new_attendees {
        attendees.push(attendee::insert(&txn, session.id, new_attendee).await?);
    }

    txn.commit().await?;

    info!(
        "Created session {} with {} attendee(s)",
        session.id,
        attendees.len()
    );

    Ok((session, attendees))
}

/// Finds a session by ID
pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Finds the sessions matching `filter`, most recently created first.
pub async fn find_by(db: &DatabaseConnection, filter: &SessionFilter) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find().order_by_desc(Column::CreatedAt);

    if let Some(state) = filter.state {
        query = query.filter(Column::State.eq(state));
    }
    if let Some(stage) = filter.failed_stage {
        query = query.filter(Column::FailedStage.eq(stage));
    }
    if let Some(title) = filter.title.as_deref() {
        query = query.filter(
            Expr::expr(Func::lower(Expr::col(Column::Title)))
                .like(format!("%{}%", title.to_lowercase())),
        );
    }

    Ok(query.limit(filter.limit).all(db).await?)
}

/// Atomically moves a session from the expected lifecycle value to the one in `transition`.
///
/// The state flip, the transcript/failure payload and any insight record write are applied in
/// one transaction. Returns `Ok(None)` without writing anything when the stored lifecycle no
/// longer matches `expected_state`/`expected_failed_stage`.
pub async fn transition(
    db: &DatabaseConnection,
    id: Id,
    expected_state: SessionState,
    expected_failed_stage: Option<PipelineStage>,
    transition: Transition,
) -> Result<Option<Model>, Error> {
    let now: DateTimeWithTimeZone = chrono::Utc::now().into();
    let txn = db.begin().await?;

    let condition = Condition::all()
        .add(Column::Id.eq(id))
        .add(Column::State.eq(expected_state));
    let condition = match expected_failed_stage {
        Some(stage) => condition.add(Column::FailedStage.eq(stage)),
        None => condition.add(Column::FailedStage.is_null()),
    };

    let result = Entity::update_many()
        .set(transition.active_model(now))
        .filter(condition)
        .exec(&txn)
        .await?;

    if result.rows_affected != 1 {
        debug!(
            "Session {id} is no longer {expected_state} ({expected_failed_stage:?}), not moving to {}",
            transition.state
        );
        txn.rollback().await?;
        return Ok(None);
    }

    match transition.insight {
        Some(InsightChange::Upsert(new_insight)) => {
            insight_record::upsert(&txn, id, new_insight).await?;
        }
        Some(InsightChange::Delivery(tracking)) => {
            insight_record::record_delivery(&txn, id, tracking).await?;
        }
        None => {}
    }

    let session = Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(Error::not_found)?;

    txn.commit().await?;

    debug!(
        "Session {id} moved from {expected_state} to {}",
        session.state
    );

    Ok(Some(session))
}

/// Deletes a session; attendees and insight record go with it via `ON DELETE CASCADE`.
pub async fn delete_by_id(db: &DatabaseConnection, id: Id) -> Result<(), Error> {
    let session = find_by_id(db, id).await?;
    Entity::delete_by_id(session.id).exec(db).await?;
    Ok(())
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use crate::error::EntityApiErrorKind;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn session_model(state: SessionState) -> Model {
        let now = chrono::Utc::now();
        Model {
            id: Id::new_v4(),
            title: "Standup".to_string(),
            description: None,
            state,
            failed_stage: None,
            transcript: None,
            word_count: None,
            transcription_provider: None,
            audio_duration_seconds: None,
            transcription_seconds: None,
            language: None,
            last_error_kind: None,
            last_error_message: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn create_returns_a_new_session_model() -> Result<(), Error> {
        let session_model = session_model(SessionState::Created);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_model.clone()]])
            .into_connection();

        let (session, attendees) = create(
            &db,
            NewSession {
                title: "Standup".to_string(),
                ..Default::default()
            },
            vec![],
        )
        .await?;

        assert_eq!(session.id, session_model.id);
        assert_eq!(session.state, SessionState::Created);
        assert!(attendees.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn find_by_id_returns_record_not_found_for_a_missing_session() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<Model>::new()])
            .into_connection();

        let result = find_by_id(&db, Id::new_v4()).await;

        assert_eq!(
            result.unwrap_err().error_kind,
            EntityApiErrorKind::RecordNotFound
        );
    }

    #[tokio::test]
    async fn transition_returns_none_when_no_row_matches_the_expected_state() -> Result<(), Error>
    {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let result = transition(
            &db,
            Id::new_v4(),
            SessionState::Created,
            None,
            Transition::to(SessionState::Transcribing, None),
        )
        .await?;

        assert!(result.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn transition_returns_the_updated_session_when_the_flip_applies() -> Result<(), Error> {
        let transcribing = session_model(SessionState::Transcribing);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results(vec![vec![transcribing.clone()]])
            .into_connection();

        let result = transition(
            &db,
            transcribing.id,
            SessionState::Created,
            None,
            Transition::to(SessionState::Transcribing, None),
        )
        .await?;

        assert_eq!(result.map(|s| s.state), Some(SessionState::Transcribing));

        Ok(())
    }

    #[tokio::test]
    async fn find_by_returns_the_matching_sessions() -> Result<(), Error> {
        let mut failed = session_model(SessionState::Failed);
        failed.failed_stage = Some(PipelineStage::Synthesize);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![failed.clone()]])
            .into_connection();

        let sessions = find_by(
            &db,
            &SessionFilter {
                state: Some(SessionState::Failed),
                failed_stage: Some(PipelineStage::Synthesize),
                limit: Some(10),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(sessions, vec![failed]);

        Ok(())
    }

    #[test]
    fn filter_matches_state_stage_and_title() {
        let mut session = session_model(SessionState::Failed);
        session.failed_stage = Some(PipelineStage::Deliver);

        let by_stage = SessionFilter {
            state: Some(SessionState::Failed),
            failed_stage: Some(PipelineStage::Deliver),
            ..Default::default()
        };
        let by_title = SessionFilter {
            title: Some("STAND".to_string()),
            ..Default::default()
        };
        let other_stage = SessionFilter {
            failed_stage: Some(PipelineStage::Transcribe),
            ..Default::default()
        };

        assert!(by_stage.matches(&session));
        assert!(by_title.matches(&session));
        assert!(!other_stage.matches(&session));
    }

    #[test]
    fn apply_records_transcript_and_clears_the_previous_failure() {
        let mut session = session_model(SessionState::Transcribing);
        session.last_error_kind = Some(FailureKind::TransientProviderError);
        session.last_error_message = Some("upstream timed out".to_string());

        Transition::to(SessionState::Transcribed, None)
            .with_transcript(TranscriptPayload {
                text: "hello team".to_string(),
                word_count: 2,
                provider: "whisper".to_string(),
                audio_duration_seconds: Some(30.0),
                elapsed_seconds: 1.5,
                language: None,
            })
            .clearing_failure()
            .apply(&mut session, chrono::Utc::now().into());

        assert_eq!(session.state, SessionState::Transcribed);
        assert_eq!(session.transcript.as_deref(), Some("hello team"));
        assert_eq!(session.word_count, Some(2));
        assert_eq!(session.last_error_kind, None);
        assert_eq!(session.last_error_message, None);
    }
}
