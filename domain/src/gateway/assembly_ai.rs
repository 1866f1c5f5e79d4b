//! AssemblyAI API client for transcription services.
//!
//! AssemblyAI transcribes asynchronously: the recording is uploaded, a transcript job is
//! created for the returned URL, and the job is polled until it completes or errors.

use super::{build_client, decode_error, error_for_status, send_error, sensitive_header};
use async_trait::async_trait;
use log::*;
use meeting_ai::pricing::{self, ASSEMBLYAI_USD_PER_MINUTE};
use meeting_ai::traits::transcription::Provider;
use meeting_ai::types::transcription::{AudioRequest, Transcript};
use meeting_ai::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PROVIDER_ID: &str = "assemblyai";

/// Response from uploading a local file
#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

/// Request to create a new transcription
#[derive(Debug, Serialize)]
pub struct CreateTranscriptRequest {
    pub audio_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    /// Let AssemblyAI detect the language when no code is given
    pub language_detection: bool,
    pub punctuate: bool,
    pub format_text: bool,
}

/// Transcript job as returned by create and get
#[derive(Debug, Deserialize)]
pub struct TranscriptResponse {
    pub id: String,
    pub status: TranscriptStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub audio_duration: Option<f64>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Transcript processing status
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

/// AssemblyAI API client
pub struct AssemblyAiClient {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl AssemblyAiClient {
    /// Create a new AssemblyAI client with the given API key and base URL
    pub fn new(api_key: &str, base_url: &str, poll_interval: Duration) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, sensitive_header(api_key)?);

        Ok(Self {
            client: build_client(headers)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval,
        })
    }

    /// Upload raw audio bytes and return the private URL AssemblyAI assigned to them
    pub async fn upload(&self, bytes: Vec<u8>) -> Result<String, Error> {
        let url = format!("{}/upload", self.base_url);
        debug!("Uploading {} bytes to AssemblyAI", bytes.len());

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;
        let response = error_for_status(PROVIDER_ID, response).await?;

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| decode_error(PROVIDER_ID, e))?;
        Ok(upload.upload_url)
    }

    /// Create a new transcription request
    pub async fn create_transcript(
        &self,
        request: CreateTranscriptRequest,
    ) -> Result<TranscriptResponse, Error> {
        let url = format!("{}/transcript", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;
        let response = error_for_status(PROVIDER_ID, response).await?;

        let transcript: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| decode_error(PROVIDER_ID, e))?;
        info!("Created AssemblyAI transcript with ID: {}", transcript.id);
        Ok(transcript)
    }

    /// Get the status of a transcript
    pub async fn get_transcript(&self, transcript_id: &str) -> Result<TranscriptResponse, Error> {
        let url = format!("{}/transcript/{}", self.base_url, transcript_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;
        let response = error_for_status(PROVIDER_ID, response).await?;

        response
            .json()
            .await
            .map_err(|e| decode_error(PROVIDER_ID, e))
    }

    /// Poll a transcript job until it leaves the queued/processing states.
    ///
    /// The caller bounds the total wait; this loop only ends on a terminal status.
    async fn wait_for_completion(
        &self,
        mut transcript: TranscriptResponse,
    ) -> Result<TranscriptResponse, Error> {
        loop {
            match transcript.status {
                TranscriptStatus::Completed => return Ok(transcript),
                TranscriptStatus::Error => {
                    let reason = transcript
                        .error
                        .unwrap_or_else(|| "transcript job failed".to_string());
                    warn!("AssemblyAI transcript {} failed: {reason}", transcript.id);
                    return Err(Error::Provider(format!("assemblyai job failed: {reason}")));
                }
                TranscriptStatus::Queued | TranscriptStatus::Processing => {
                    trace!(
                        "AssemblyAI transcript {} is {:?}",
                        transcript.id,
                        transcript.status
                    );
                    tokio::time::sleep(self.poll_interval).await;
                    transcript = self.get_transcript(&transcript.id).await?;
                }
            }
        }
    }
}

#[async_trait]
impl Provider for AssemblyAiClient {
    async fn transcribe(&self, request: AudioRequest) -> Result<Transcript, Error> {
        let audio_url = self.upload(request.bytes).await?;
        let created = self
            .create_transcript(CreateTranscriptRequest {
                audio_url,
                language_detection: request.language.is_none(),
                language_code: request.language,
                punctuate: true,
                format_text: true,
            })
            .await?;

        let completed = self.wait_for_completion(created).await?;
        let text = completed.text.ok_or_else(|| {
            Error::MalformedResponse("assemblyai completed without transcript text".to_string())
        })?;

        Ok(Transcript::new(
            text,
            completed.audio_duration,
            completed.language_code,
        ))
    }

    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    /// Verify the API key is valid by listing a single transcript
    async fn health_check(&self) -> Result<bool, Error> {
        let url = format!("{}/transcript?limit=1", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;

        // 200 means valid key, 401 means invalid key
        Ok(response.status().is_success())
    }

    fn estimate_cost(&self, duration_seconds: f64) -> f64 {
        pricing::transcription_cost(duration_seconds, ASSEMBLYAI_USD_PER_MINUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meeting_ai::types::transcription::AudioFormat;
    use mockito::{Matcher, Server};

    fn client(url: &str) -> AssemblyAiClient {
        AssemblyAiClient::new("aai-test", url, Duration::from_millis(1)).expect("client")
    }

    fn clip() -> AudioRequest {
        AudioRequest {
            bytes: b"RIFF....WAVE".to_vec(),
            file_name: "standup.wav".to_string(),
            format: AudioFormat::Wav,
            language: None,
            prompt: None,
        }
    }

    #[tokio::test]
    async fn transcribe_uploads_creates_and_polls() {
        let mut server = Server::new_async().await;
        let upload = server
            .mock("POST", "/upload")
            .match_header("authorization", "aai-test")
            .with_status(200)
            .with_body(format!(r#"{{"upload_url":"{}/files/abc"}}"#, server.url()))
            .create_async()
            .await;
        let create = server
            .mock("POST", "/transcript")
            .match_body(Matcher::PartialJsonString(
                r#"{"language_detection":true}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"id":"t-1","status":"queued"}"#)
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/transcript/t-1")
            .with_status(200)
            .with_body(
                r#"{"id":"t-1","status":"completed","text":"hello team","audio_duration":30,"language_code":"en"}"#,
            )
            .create_async()
            .await;

        let transcript = client(&server.url())
            .transcribe(clip())
            .await
            .expect("transcript");

        upload.assert_async().await;
        create.assert_async().await;
        poll.assert_async().await;
        assert_eq!(transcript.text, "hello team");
        assert_eq!(transcript.word_count, 2);
        assert_eq!(transcript.duration_seconds, Some(30.0));
        assert_eq!(transcript.language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn failed_job_is_a_provider_error() {
        let mut server = Server::new_async().await;
        let _upload = server
            .mock("POST", "/upload")
            .with_status(200)
            .with_body(r#"{"upload_url":"https://cdn.example/abc"}"#)
            .create_async()
            .await;
        let _create = server
            .mock("POST", "/transcript")
            .with_status(200)
            .with_body(r#"{"id":"t-2","status":"error","error":"audio could not be decoded"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).transcribe(clip()).await.unwrap_err();

        assert_eq!(
            err,
            Error::Provider("assemblyai job failed: audio could not be decoded".to_string())
        );
    }

    #[tokio::test]
    async fn health_check_reports_rejected_key_as_unhealthy() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/transcript")
            .match_query(Matcher::UrlEncoded("limit".into(), "1".into()))
            .with_status(401)
            .create_async()
            .await;

        assert!(!client(&server.url()).health_check().await.expect("reachable"));
    }
}
