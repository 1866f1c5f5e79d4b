//! Transcription provider trait.

use crate::types::transcription::{AudioRequest, Transcript};
use crate::Error;
use async_trait::async_trait;

/// Abstraction for speech-to-text transcription services.
///
/// Implementations convert an uploaded recording to text. Supports Whisper and AssemblyAI.
/// This trait enables provider fallback and swapping for cost or availability.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Transcribe the recording and return the complete text.
    ///
    /// Implementations return either a complete transcript or an error, never a partial one.
    /// Providers that run asynchronous jobs poll internally until the job finishes.
    async fn transcribe(&self, request: AudioRequest) -> std::result::Result<Transcript, Error>;

    /// Return unique identifier for this provider (e.g., "whisper", "assemblyai").
    ///
    /// Used for fallback ordering, cost tracking and the stored transcript's provenance.
    /// Must be lowercase, alphanumeric with underscores only.
    fn provider_id(&self) -> &'static str;

    /// Lightweight request confirming the provider is reachable and the credentials work.
    async fn health_check(&self) -> std::result::Result<bool, Error>;

    /// USD cost of transcribing `duration_seconds` of audio. Never contacts the provider.
    fn estimate_cost(&self, duration_seconds: f64) -> f64;
}
