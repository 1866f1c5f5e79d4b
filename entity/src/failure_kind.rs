use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Persisted classification of the last stage failure of a session.
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
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "failure_kind")]
pub enum FailureKind {
    /// Network, timeout or 5xx from a provider. Retrying may help.
    #[sea_orm(string_value = "transient_provider_error")]
    TransientProviderError,
    /// Credentials rejected or quota exhausted.
    #[sea_orm(string_value = "auth_or_quota_error")]
    AuthOrQuotaError,
    /// The provider answered but the content broke its contract.
    #[sea_orm(string_value = "malformed_response_error")]
    MalformedResponseError,
    /// The input was invalid.
    #[sea_orm(string_value = "validation_error")]
    ValidationError,
}

impl FailureKind {
    /// Whether triggering the same stage again is expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::TransientProviderError | FailureKind::MalformedResponseError
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::TransientProviderError => write!(fmt, "transient_provider_error"),
            FailureKind::AuthOrQuotaError => write!(fmt, "auth_or_quota_error"),
            FailureKind::MalformedResponseError => write!(fmt, "malformed_response_error"),
            FailureKind::ValidationError => write!(fmt, "validation_error"),
        }
    }
}
