//! SeaORM Entity for the insight_records table.
//! Structured synthesis output for a session plus its delivery tracking.

use crate::delivery_outcome::DeliveryOutcome;
use crate::lists::{ActionItems, TextList};
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::insight_records::Model)]
#[sea_orm(schema_name = "meeting_synthesis", table_name = "insight_records")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    #[sea_orm(unique)]
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Id,

    #[sea_orm(column_type = "Text")]
    pub summary: String,

    pub summary_word_count: i32,

    #[sea_orm(column_type = "JsonBinary")]
    pub decisions: TextList,

    #[sea_orm(column_type = "JsonBinary")]
    pub action_items: ActionItems,

    #[sea_orm(column_type = "JsonBinary")]
    pub open_questions: TextList,

    #[sea_orm(column_type = "JsonBinary")]
    pub topics: TextList,

    /// Extractor that produced this record (e.g. "openai")
    pub extraction_provider: String,

    pub extraction_model: String,

    pub tokens_used: i32,

    pub extraction_seconds: f64,

    #[schema(value_type = Option<String>, format = DateTime)]
    pub delivered_at: Option<DateTimeWithTimeZone>,

    /// Recipients used by the last successful delivery
    #[sea_orm(column_type = "JsonBinary")]
    pub delivered_recipients: TextList,

    pub delivery_outcome: Option<DeliveryOutcome>,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sessions::Entity",
        from = "Column::SessionId",
        to = "super::sessions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Sessions,
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
