use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Where a session sits in the transcribe, synthesize, deliver pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    EnumIter,
    Deserialize,
    Default,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "session_state")]
pub enum SessionState {
    /// Session exists, no audio has been transcribed yet
    #[sea_orm(string_value = "created")]
    #[default]
    Created,
    #[sea_orm(string_value = "transcribing")]
    Transcribing,
    /// A complete transcript is stored
    #[sea_orm(string_value = "transcribed")]
    Transcribed,
    #[sea_orm(string_value = "synthesizing")]
    Synthesizing,
    /// An insight record is stored
    #[sea_orm(string_value = "synthesized")]
    Synthesized,
    #[sea_orm(string_value = "delivering")]
    Delivering,
    /// The insight record was sent to its recipients
    #[sea_orm(string_value = "delivered")]
    Delivered,
    /// A stage failed; `failed_stage` says which one can be retried
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Created => write!(fmt, "created"),
            SessionState::Transcribing => write!(fmt, "transcribing"),
            SessionState::Transcribed => write!(fmt, "transcribed"),
            SessionState::Synthesizing => write!(fmt, "synthesizing"),
            SessionState::Synthesized => write!(fmt, "synthesized"),
            SessionState::Delivering => write!(fmt, "delivering"),
            SessionState::Delivered => write!(fmt, "delivered"),
            SessionState::Failed => write!(fmt, "failed"),
        }
    }
}
