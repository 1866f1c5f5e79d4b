//! Transcription stage: turns an uploaded recording into the session's transcript.

use super::Orchestrator;
use crate::error::{DomainErrorKind, Error};
use crate::lifecycle::Lifecycle;
use crate::{sessions, Id};
use entity::pipeline_stage::PipelineStage;
use entity_api::session::{Transition, TranscriptPayload};
use log::*;
use meeting_ai::traits::transcription::Provider as TranscriptionProvider;
use meeting_ai::types::transcription::{AudioFormat, AudioRequest, Transcript};
use meeting_ai::Error as AdapterError;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const STAGE: PipelineStage = PipelineStage::Transcribe;

/// An uploaded recording and the caller's hints for transcribing it.
#[derive(Clone, Default, PartialEq)]
pub struct TranscriptionInput {
    pub audio: Vec<u8>,
    pub file_name: String,
    /// ISO-639-1 hint; the session's language is used when absent
    pub language: Option<String>,
    pub prompt: Option<String>,
    /// Provider id to try before the configured primary
    pub prefer_provider: Option<String>,
}

impl std::fmt::Debug for TranscriptionInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionInput")
            .field("audio", &self.audio.len())
            .field("file_name", &self.file_name)
            .field("language", &self.language)
            .field("prompt", &self.prompt)
            .field("prefer_provider", &self.prefer_provider)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Orchestrator {
    /// Transcribes `input` and stores the transcript on the session.
    ///
    /// Admitted from `created` and `failed(transcribe)`.
    pub async fn transcribe(
        &self,
        id: Id,
        input: TranscriptionInput,
        cancel: Option<&CancellationToken>,
    ) -> Result<sessions::Model, Error> {
        let session = self.store().get(id).await?;
        self.check_admission(&session, STAGE, false)?;

        let providers = self.provider_order(input.prefer_provider.as_deref())?;
        let request = self.audio_request(&session, input)?;

        self.claim(id, STAGE, false, &session, cancel).await?;
        debug!("Transcribing {request:?} for session {id}");

        let worker = self.clone();
        tokio::spawn(async move { worker.run_transcription(id, request, providers).await })
            .await?
    }

    fn audio_request(
        &self,
        session: &sessions::Model,
        input: TranscriptionInput,
    ) -> Result<AudioRequest, Error> {
        if input.audio.is_empty() {
            return Err(Error::validation("audio file is empty"));
        }
        let max_bytes = self.settings().max_audio_bytes;
        if input.audio.len() > max_bytes {
            return Err(Error::validation(format!(
                "audio file is {} bytes, the limit is {max_bytes} bytes",
                input.audio.len()
            )));
        }
        let format = AudioFormat::from_file_name(&input.file_name)
            .map_err(|err| Error::validation(err.to_string()))?;

        Ok(AudioRequest {
            bytes: input.audio,
            file_name: input.file_name,
            format,
            language: non_blank(input.language).or_else(|| session.language.clone()),
            prompt: non_blank(input.prompt),
        })
    }

    /// Configured transcribers in the order they are tried, a preferred one moved first.
    fn provider_order(
        &self,
        prefer_provider: Option<&str>,
    ) -> Result<Vec<Arc<dyn TranscriptionProvider>>, Error> {
        let mut providers = self.adapters().transcribers.clone();
        if providers.is_empty() {
            return Err(Error::new(DomainErrorKind::Config(
                "no transcription provider is configured".to_string(),
            )));
        }

        if let Some(preferred) = prefer_provider.map(str::trim).filter(|p| !p.is_empty()) {
            let position = providers
                .iter()
                .position(|provider| provider.provider_id() == preferred)
                .ok_or_else(|| {
                    Error::validation(format!(
                        "unknown transcription provider: {preferred}"
                    ))
                })?;
            let provider = providers.remove(position);
            providers.insert(0, provider);
        }

        Ok(providers)
    }

    async fn run_transcription(
        &self,
        id: Id,
        request: AudioRequest,
        providers: Vec<Arc<dyn TranscriptionProvider>>,
    ) -> Result<sessions::Model, Error> {
        let started = Instant::now();
        let mut last_error = AdapterError::Configuration(
            "no transcription provider was attempted".to_string(),
        );

        for (position, provider) in providers.iter().enumerate() {
            let provider_id = provider.provider_id();

            if position > 0 {
                let check =
                    tokio::time::timeout(self.settings().stage_timeout, provider.health_check());
                match check.await {
                    Ok(Ok(true)) => info!("Falling back to {provider_id} for session {id}"),
                    Ok(Ok(false)) => {
                        warn!("Skipping fallback {provider_id}: health check failed");
                        continue;
                    }
                    Ok(Err(err)) => {
                        warn!("Skipping fallback {provider_id}: {err}");
                        continue;
                    }
                    Err(_) => {
                        warn!("Skipping fallback {provider_id}: health check timed out");
                        continue;
                    }
                }
            }

            let operation = format!("{provider_id} transcription of session {id}");
            let outcome = self
                .call_adapter(&operation, || {
                    let provider = Arc::clone(provider);
                    let request = request.clone();
                    async move {
                        let transcript = provider.transcribe(request).await?;
                        if transcript.text.trim().is_empty() {
                            return Err(AdapterError::MalformedResponse(
                                "transcript text is empty".to_string(),
                            ));
                        }
                        Ok(transcript)
                    }
                })
                .await;

            match outcome {
                Ok(transcript) => {
                    let payload = transcript_payload(
                        transcript,
                        provider_id,
                        started.elapsed().as_secs_f64(),
                    );
                    info!(
                        "Session {id} transcribed by {provider_id}: {} words",
                        payload.word_count
                    );
                    let done = Lifecycle::completed(STAGE);
                    let transition = Transition::to(done.state, done.failed_stage)
                        .with_transcript(payload)
                        .clearing_failure();
                    return self.complete(id, STAGE, transition).await;
                }
                Err(err) => {
                    warn!("Transcription of session {id} with {provider_id} failed: {err}");
                    last_error = err;
                }
            }
        }

        Err(self.fail(id, STAGE, last_error).await)
    }
}

fn transcript_payload(
    transcript: Transcript,
    provider_id: &str,
    elapsed_seconds: f64,
) -> TranscriptPayload {
    TranscriptPayload {
        word_count: i32::try_from(transcript.word_count).unwrap_or(i32::MAX),
        text: transcript.text,
        provider: provider_id.to_string(),
        audio_duration_seconds: transcript.duration_seconds,
        elapsed_seconds,
        language: transcript.language,
    }
}
