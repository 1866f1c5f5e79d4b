//! HTTP and SMTP clients for the external providers, each implementing one of the
//! `meeting_ai` adapter traits.
//!
//! Every client maps its transport failures onto `meeting_ai::Error` so the orchestrator can
//! classify them without knowing which provider produced them.

use log::*;
use meeting_ai::Error as AdapterError;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Response, StatusCode};

pub mod assembly_ai;
pub mod mailersend;
pub mod openai;
pub mod smtp;
pub mod whisper;

/// Longest slice of a provider's error body carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Builds a header value that is redacted from `Debug` output.
pub(crate) fn sensitive_header(value: &str) -> Result<HeaderValue, AdapterError> {
    let mut header_value = HeaderValue::from_str(value).map_err(|e| {
        warn!("Failed to create authorization header value: {e:?}");
        AdapterError::Configuration("API key contains invalid header characters".to_string())
    })?;
    header_value.set_sensitive(true);
    Ok(header_value)
}

/// Builds a rustls client that sends `headers` with every request.
pub(crate) fn build_client(headers: HeaderMap) -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .default_headers(headers)
        .build()
        .map_err(|e| {
            warn!("Failed to build HTTP client: {e:?}");
            AdapterError::Configuration("failed to build HTTP client".to_string())
        })
}

/// Bearer-token headers shared by the OpenAI and MailerSend clients.
pub(crate) fn bearer_headers(api_key: &str) -> Result<HeaderMap, AdapterError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::AUTHORIZATION,
        sensitive_header(&format!("Bearer {api_key}"))?,
    );
    Ok(headers)
}

/// Classifies a failure to get any response at all.
pub(crate) fn send_error(provider: &str, err: reqwest::Error) -> AdapterError {
    warn!("Request to {provider} failed: {err:?}");
    if err.is_timeout() {
        AdapterError::Timeout(format!("{provider} did not respond in time"))
    } else {
        AdapterError::Network(format!("could not reach {provider}"))
    }
}

/// Classifies a response body that does not decode into the expected shape.
pub(crate) fn decode_error(provider: &str, err: reqwest::Error) -> AdapterError {
    warn!("Failed to parse {provider} response: {err:?}");
    if err.is_decode() {
        AdapterError::MalformedResponse(format!("{provider} returned an unexpected body"))
    } else {
        send_error(provider, err)
    }
}

/// Passes successful responses through and maps error statuses onto the failure taxonomy.
pub(crate) async fn error_for_status(
    provider: &str,
    response: Response,
) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_seconds = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    warn!("{provider} returned {status}: {body}");

    Err(classify_status(provider, status, &body, retry_after_seconds))
}

fn classify_status(
    provider: &str,
    status: StatusCode,
    body: &str,
    retry_after_seconds: Option<u64>,
) -> AdapterError {
    let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    let message = format!("{provider} returned {status}: {excerpt}");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AdapterError::Authentication(message),
        StatusCode::PAYMENT_REQUIRED => AdapterError::QuotaExceeded(message),
        StatusCode::TOO_MANY_REQUESTS if body.contains("insufficient_quota") => {
            AdapterError::QuotaExceeded(message)
        }
        StatusCode::TOO_MANY_REQUESTS => AdapterError::RateLimited {
            retry_after_seconds: retry_after_seconds.unwrap_or_default(),
        },
        StatusCode::REQUEST_TIMEOUT => AdapterError::Timeout(message),
        status if status.is_server_error() => AdapterError::Provider(message),
        _ => AdapterError::Validation(message),
    }
}
