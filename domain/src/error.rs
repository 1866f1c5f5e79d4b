//! Error types for the `domain` layer.
use entity::failure_kind::FailureKind;
use entity::pipeline_stage::PipelineStage;
use entity::session_state::SessionState;
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use meeting_ai::Error as AdapterError;
use std::error::Error as StdError;
use std::fmt;

/// Longest adapter message stored on a session or returned to a caller.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Top-level domain error type.
/// Errors from lower layers (`entity_api`, `meeting_ai`) are translated into a
/// `DomainErrorKind` here, keeping the original error as `source`. `web` only ever sees
/// `DomainErrorKind` and derives HTTP status codes and response bodies from it.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Caller-visible failure categories of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainErrorKind {
    /// Caller input is invalid; nothing was changed and no provider was contacted.
    Validation(String),
    /// The session's lifecycle does not allow `stage` to start.
    StageSequence {
        stage: PipelineStage,
        state: SessionState,
    },
    /// Another trigger of `stage` holds the session.
    StageAlreadyRunning { stage: PipelineStage },
    NotFound,
    /// A store operation failed; the current call was aborted without a partial write.
    Persistence,
    /// The stage ran and the session is now failed at `stage`.
    StageFailed {
        stage: PipelineStage,
        kind: FailureKind,
        retryable: bool,
        message: String,
    },
    /// The trigger was cancelled before the session was claimed.
    Cancelled,
    Config(String),
}

impl Error {
    pub fn new(error_kind: DomainErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(DomainErrorKind::Validation(message.into()))
    }

    pub fn not_found() -> Self {
        Self::new(DomainErrorKind::NotFound)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Persistence,
        }
    }

    /// Failure of `stage` caused by an adapter error, which is kept as the source.
    pub fn stage_failed(stage: PipelineStage, err: AdapterError) -> Self {
        let kind = failure_kind_of(&err);
        Error {
            error_kind: DomainErrorKind::StageFailed {
                stage,
                kind,
                retryable: err.is_retryable(),
                message: sanitize_message(&err.to_string()),
            },
            source: Some(Box::new(err)),
        }
    }
}

/// Maps the adapter-level classification onto the persisted failure kind.
pub fn failure_kind_of(err: &AdapterError) -> FailureKind {
    match err.kind() {
        meeting_ai::FailureKind::TransientProvider => FailureKind::TransientProviderError,
        meeting_ai::FailureKind::AuthOrQuota => FailureKind::AuthOrQuotaError,
        meeting_ai::FailureKind::MalformedResponse => FailureKind::MalformedResponseError,
        meeting_ai::FailureKind::Validation => FailureKind::ValidationError,
    }
}

/// Collapses whitespace and truncates to [`MAX_ERROR_MESSAGE_CHARS`] characters.
pub fn sanitize_message(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
        Some((cut, _)) => collapsed[..cut].to_string(),
        None => collapsed,
    }
}

impl fmt::Display for DomainErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DomainErrorKind::Validation(message) => write!(f, "invalid input: {message}"),
            DomainErrorKind::StageSequence { stage, state } => {
                write!(f, "cannot start {stage} while the session is {state}")
            }
            DomainErrorKind::StageAlreadyRunning { stage } => {
                write!(f, "{stage} is already running for this session")
            }
            DomainErrorKind::NotFound => write!(f, "not found"),
            DomainErrorKind::Persistence => write!(f, "persistence failure"),
            DomainErrorKind::StageFailed {
                stage,
                kind,
                message,
                ..
            } => write!(f, "{stage} failed ({kind}): {message}"),
            DomainErrorKind::Cancelled => write!(f, "cancelled before the stage started"),
            DomainErrorKind::Config(message) => write!(f, "configuration error: {message}"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {}", self.error_kind)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => DomainErrorKind::NotFound,
            _ => DomainErrorKind::Persistence,
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Persistence,
        }
    }
}
