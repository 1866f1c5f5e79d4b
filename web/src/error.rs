use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::controller::ApiResponse;
use domain::error::{DomainErrorKind, Error as DomainError};
use domain::failure_kind::FailureKind;
use domain::pipeline_stage::PipelineStage;

extern crate log;
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self(DomainError::validation(message))
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

/// Error payload of a failed request. Source errors are never included.
#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine readable error code
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorBody {
    fn new(error: &'static str, message: String) -> Self {
        Self {
            error,
            message,
            stage: None,
            failure_kind: None,
            retryable: None,
        }
    }
}

fn status_and_body(error_kind: &DomainErrorKind) -> (StatusCode, ErrorBody) {
    let message = error_kind.to_string();
    match error_kind {
        DomainErrorKind::Validation(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorBody::new("validation", message),
        ),
        DomainErrorKind::NotFound => (StatusCode::NOT_FOUND, ErrorBody::new("not_found", message)),
        DomainErrorKind::StageSequence { stage, .. } => (
            StatusCode::CONFLICT,
            ErrorBody {
                stage: Some(*stage),
                retryable: Some(false),
                ..ErrorBody::new("stage_sequence", message)
            },
        ),
        DomainErrorKind::StageAlreadyRunning { stage } => (
            StatusCode::CONFLICT,
            ErrorBody {
                stage: Some(*stage),
                retryable: Some(true),
                ..ErrorBody::new("stage_already_running", message)
            },
        ),
        DomainErrorKind::StageFailed {
            stage,
            kind,
            retryable,
            ..
        } => {
            let status = match kind {
                FailureKind::TransientProviderError | FailureKind::MalformedResponseError => {
                    StatusCode::BAD_GATEWAY
                }
                FailureKind::AuthOrQuotaError => StatusCode::SERVICE_UNAVAILABLE,
                FailureKind::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (
                status,
                ErrorBody {
                    stage: Some(*stage),
                    failure_kind: Some(*kind),
                    retryable: Some(*retryable),
                    ..ErrorBody::new("stage_failed", message)
                },
            )
        }
        DomainErrorKind::Cancelled => (
            StatusCode::REQUEST_TIMEOUT,
            ErrorBody::new("cancelled", message),
        ),
        DomainErrorKind::Persistence => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new("persistence", message),
        ),
        DomainErrorKind::Config(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new("configuration", message),
        ),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = status_and_body(&self.0.error_kind);
        if status.is_server_error() {
            error!("{status}: {:?}", self.0);
        } else {
            debug!("{status}: {}", self.0);
        }
        (status, Json(ApiResponse::new(status.into(), body))).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
