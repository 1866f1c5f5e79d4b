use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Aggregate result of the last successful delivery of an insight record.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    EnumIter,
    Deserialize,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "delivery_outcome")]
pub enum DeliveryOutcome {
    /// Every resolved recipient was accepted by the transport
    #[sea_orm(string_value = "sent")]
    Sent,
    /// The transport accepted some recipients and rejected others
    #[sea_orm(string_value = "partial")]
    Partial,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Sent => write!(fmt, "sent"),
            DeliveryOutcome::Partial => write!(fmt, "partial"),
        }
    }
}
