//! Insight extraction provider trait.

use crate::types::insights::{Extraction, ExtractionRequest};
use crate::Error;
use async_trait::async_trait;

/// Abstraction for LLM-powered meeting transcript analysis.
///
/// Implementations turn transcript text into [`crate::types::insights::Insights`]. A
/// response that does not carry every field in the agreed shape is reported as
/// [`Error::MalformedResponse`] rather than partially returned.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract summary, decisions, action items, open questions and topics.
    ///
    /// Processing typically takes 10-60 seconds depending on transcript length and model.
    async fn extract(&self, request: ExtractionRequest) -> std::result::Result<Extraction, Error>;

    /// Return unique identifier for this provider (e.g., "openai").
    fn provider_id(&self) -> &'static str;

    /// Model used for extraction, recorded with every insight record.
    fn model(&self) -> String;

    /// Validate API credentials by making a lightweight test request.
    async fn health_check(&self) -> std::result::Result<bool, Error>;

    /// USD cost of extracting insights from a transcript of `word_count` words.
    /// Never contacts the provider.
    fn estimate_cost(&self, word_count: u64) -> f64;
}
