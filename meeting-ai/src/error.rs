//! Error types for meeting AI operations.

use std::fmt;

/// Universal error type that abstracts provider-specific errors into common variants.
///
/// All provider implementations map their native errors to these variants,
/// preserving context while maintaining a provider-agnostic interface. Messages must
/// never carry credentials; they may be persisted and returned to callers.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// API key rejected or lacking permissions. Retrying with the same credentials won't help.
    Authentication(String),

    /// The account ran out of credits or hit a hard usage cap.
    QuotaExceeded(String),

    /// Network connectivity issues, DNS failures, or dropped connections.
    Network(String),

    /// Operation exceeded the configured or provider-enforced timeout period.
    Timeout(String),

    /// Provider-side failure such as a 5xx response or a failed remote job.
    Provider(String),

    /// Provider rate limit exceeded. Clients must wait before retrying.
    RateLimited { retry_after_seconds: u64 },

    /// The provider answered successfully but the content violates the agreed shape.
    MalformedResponse(String),

    /// Caller input is invalid or was rejected by the provider as invalid.
    Validation(String),

    /// The adapter is missing required settings (API key, sender address, ...).
    Configuration(String),
}

/// Outcome classification shared by every adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Network, timeout, rate limit or 5xx; retried with exponential backoff.
    TransientProvider,
    /// Terminal for this attempt, never retried.
    AuthOrQuota,
    /// Retried a small fixed number of times, then terminal.
    MalformedResponse,
    /// Never retried and never sent to a provider.
    Validation,
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Network(_)
            | Error::Timeout(_)
            | Error::Provider(_)
            | Error::RateLimited { .. } => FailureKind::TransientProvider,
            Error::Authentication(_) | Error::QuotaExceeded(_) | Error::Configuration(_) => {
                FailureKind::AuthOrQuota
            }
            Error::MalformedResponse(_) => FailureKind::MalformedResponse,
            Error::Validation(_) => FailureKind::Validation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::TransientProvider | FailureKind::MalformedResponse
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            Error::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::Provider(msg) => write!(f, "Provider error: {}", msg),
            Error::RateLimited {
                retry_after_seconds,
            } => {
                write!(f, "Rate limited: retry after {}s", retry_after_seconds)
            }
            Error::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            Error::Validation(msg) => write!(f, "Invalid input: {}", msg),
            Error::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
