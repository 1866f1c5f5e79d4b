//! Price tables used for cost estimation. All amounts are USD.
//!
//! Estimates are pure functions of input size: no provider is contacted.

/// Whisper bills per minute of audio.
pub const WHISPER_USD_PER_MINUTE: f64 = 0.006;

/// AssemblyAI bills $0.37 per hour of audio.
pub const ASSEMBLYAI_USD_PER_MINUTE: f64 = 0.37 / 60.0;

/// Token multiplier applied to transcript word counts.
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Output tokens assumed for one synthesis response.
pub const ESTIMATED_OUTPUT_TOKENS: u64 = 500;

/// Per-1K-token prices of a language model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl TokenPrice {
    /// Price table keyed by model family.
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("gpt-4") {
            TokenPrice {
                input_per_1k: 0.01,
                output_per_1k: 0.03,
            }
        } else {
            TokenPrice {
                input_per_1k: 0.0005,
                output_per_1k: 0.0015,
            }
        }
    }
}

/// Cost of transcribing `duration_seconds` of audio at a per-minute rate.
pub fn transcription_cost(duration_seconds: f64, usd_per_minute: f64) -> f64 {
    (duration_seconds.max(0.0) / 60.0) * usd_per_minute
}

/// Estimated input tokens for a transcript of `word_count` words.
pub fn estimated_input_tokens(word_count: u64) -> u64 {
    (word_count as f64 * TOKENS_PER_WORD).ceil() as u64
}

/// Cost of one synthesis call over a transcript of `word_count` words.
pub fn synthesis_cost(word_count: u64, model: &str) -> f64 {
    let price = TokenPrice::for_model(model);
    let input_tokens = estimated_input_tokens(word_count) as f64;
    let output_tokens = ESTIMATED_OUTPUT_TOKENS as f64;

    (input_tokens / 1000.0) * price.input_per_1k + (output_tokens / 1000.0) * price.output_per_1k
}
