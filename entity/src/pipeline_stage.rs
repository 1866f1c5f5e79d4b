use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One unit of the pipeline, each with its own guard, adapter call and failure mode.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    EnumIter,
    Deserialize,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "pipeline_stage")]
pub enum PipelineStage {
    #[sea_orm(string_value = "transcribe")]
    Transcribe,
    #[sea_orm(string_value = "synthesize")]
    Synthesize,
    #[sea_orm(string_value = "deliver")]
    Deliver,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Transcribe => write!(fmt, "transcribe"),
            PipelineStage::Synthesize => write!(fmt, "synthesize"),
            PipelineStage::Deliver => write!(fmt, "deliver"),
        }
    }
}
