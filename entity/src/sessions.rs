//! SeaORM Entity for the sessions table.
//! One row per meeting recording, carrying its pipeline lifecycle and transcript.

use crate::failure_kind::FailureKind;
use crate::pipeline_stage::PipelineStage;
use crate::session_state::SessionState;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::sessions::Model)]
#[sea_orm(schema_name = "meeting_synthesis", table_name = "sessions")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[serde(skip_deserializing)]
    pub state: SessionState,

    /// Stage to retry when `state` is failed
    #[serde(skip_deserializing)]
    pub failed_stage: Option<PipelineStage>,

    /// Complete transcript text, never a partial one
    #[serde(skip_deserializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub transcript: Option<String>,

    #[serde(skip_deserializing)]
    pub word_count: Option<i32>,

    /// Provider that produced the stored transcript
    #[serde(skip_deserializing)]
    pub transcription_provider: Option<String>,

    #[serde(skip_deserializing)]
    pub audio_duration_seconds: Option<f64>,

    /// Wall-clock seconds the transcription stage took
    #[serde(skip_deserializing)]
    pub transcription_seconds: Option<f64>,

    pub language: Option<String>,

    #[serde(skip_deserializing)]
    pub last_error_kind: Option<FailureKind>,

    #[serde(skip_deserializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error_message: Option<String>,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attendees::Entity")]
    Attendees,

    #[sea_orm(has_one = "super::insight_records::Entity")]
    InsightRecords,
}

impl Related<super::attendees::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendees.def()
    }
}

impl Related<super::insight_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InsightRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
