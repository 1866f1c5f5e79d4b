//! OpenAI Whisper client for the transcription stage.

use super::{bearer_headers, build_client, decode_error, error_for_status, send_error};
use async_trait::async_trait;
use log::*;
use meeting_ai::pricing::{self, WHISPER_USD_PER_MINUTE};
use meeting_ai::traits::transcription::Provider;
use meeting_ai::types::transcription::{AudioRequest, Transcript};
use meeting_ai::Error;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

pub const PROVIDER_ID: &str = "whisper";

/// `verbose_json` transcription response; only the fields we keep.
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

pub struct WhisperClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl WhisperClient {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, Error> {
        Ok(Self {
            client: build_client(bearer_headers(api_key)?)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn form(&self, request: AudioRequest) -> Result<Form, Error> {
        let file = Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(request.format.mime_type())
            .map_err(|e| Error::Validation(format!("unsupported audio type: {e}")))?;

        let mut form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = request.language {
            form = form.text("language", language);
        }
        if let Some(prompt) = request.prompt {
            form = form.text("prompt", prompt);
        }
        Ok(form)
    }
}

#[async_trait]
impl Provider for WhisperClient {
    async fn transcribe(&self, request: AudioRequest) -> Result<Transcript, Error> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!(
            "Uploading {} ({} bytes) to Whisper",
            request.file_name,
            request.bytes.len()
        );

        let response = self
            .client
            .post(&url)
            .multipart(self.form(request)?)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;
        let response = error_for_status(PROVIDER_ID, response).await?;

        let body: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| decode_error(PROVIDER_ID, e))?;

        let transcript = Transcript::new(body.text, body.duration, body.language);
        info!(
            "Whisper transcribed {} words ({:?}s of audio)",
            transcript.word_count, transcript.duration_seconds
        );
        Ok(transcript)
    }

    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn health_check(&self) -> Result<bool, Error> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;
        Ok(response.status().is_success())
    }

    fn estimate_cost(&self, duration_seconds: f64) -> f64 {
        pricing::transcription_cost(duration_seconds, WHISPER_USD_PER_MINUTE)
    }
}
