use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const ENUM_TYPES: [(&str, &str); 4] = [
    (
        "session_state",
        "'created', 'transcribing', 'transcribed', 'synthesizing', 'synthesized', \
         'delivering', 'delivered', 'failed'",
    ),
    ("pipeline_stage", "'transcribe', 'synthesize', 'deliver'"),
    (
        "failure_kind",
        "'transient_provider_error', 'auth_or_quota_error', 'malformed_response_error', \
         'validation_error'",
    ),
    ("delivery_outcome", "'sent', 'partial'"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for (name, values) in ENUM_TYPES {
            db.execute_unprepared(&format!(
                "CREATE TYPE meeting_synthesis.{name} AS ENUM ({values})"
            ))
            .await?;
        }

        db.execute_unprepared(
            "CREATE TABLE meeting_synthesis.sessions (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                title VARCHAR(255) NOT NULL,
                description TEXT,
                state meeting_synthesis.session_state NOT NULL DEFAULT 'created',
                failed_stage meeting_synthesis.pipeline_stage,
                transcript TEXT,
                word_count INTEGER,
                transcription_provider VARCHAR(64),
                audio_duration_seconds DOUBLE PRECISION,
                transcription_seconds DOUBLE PRECISION,
                language VARCHAR(16),
                last_error_kind meeting_synthesis.failure_kind,
                last_error_message TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT failed_stage_only_when_failed
                    CHECK ((state = 'failed') = (failed_stage IS NOT NULL))
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE meeting_synthesis.attendees (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                session_id UUID NOT NULL
                    REFERENCES meeting_synthesis.sessions(id) ON DELETE CASCADE,
                name VARCHAR(255) NOT NULL,
                email VARCHAR(255) NOT NULL,
                is_organizer BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE meeting_synthesis.insight_records (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                session_id UUID NOT NULL UNIQUE
                    REFERENCES meeting_synthesis.sessions(id) ON DELETE CASCADE,
                summary TEXT NOT NULL,
                summary_word_count INTEGER NOT NULL,
                decisions JSONB NOT NULL DEFAULT '[]',
                action_items JSONB NOT NULL DEFAULT '[]',
                open_questions JSONB NOT NULL DEFAULT '[]',
                topics JSONB NOT NULL DEFAULT '[]',
                extraction_provider VARCHAR(64) NOT NULL,
                extraction_model VARCHAR(128) NOT NULL,
                tokens_used INTEGER NOT NULL DEFAULT 0,
                extraction_seconds DOUBLE PRECISION NOT NULL DEFAULT 0,
                delivered_at TIMESTAMPTZ,
                delivered_recipients JSONB NOT NULL DEFAULT '[]',
                delivery_outcome meeting_synthesis.delivery_outcome,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS attendees_session_id_idx
             ON meeting_synthesis.attendees(session_id)",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS sessions_state_idx
             ON meeting_synthesis.sessions(state)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP TABLE IF EXISTS meeting_synthesis.insight_records")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS meeting_synthesis.attendees")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS meeting_synthesis.sessions")
            .await?;

        for (name, _) in ENUM_TYPES.iter().rev() {
            db.execute_unprepared(&format!("DROP TYPE IF EXISTS meeting_synthesis.{name}"))
                .await?;
        }

        Ok(())
    }
}
