//! Types for transcription operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::Error;

/// Audio container formats accepted for transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Mp4,
    M4a,
    Wav,
    Webm,
    Ogg,
    Flac,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 7] = [
        AudioFormat::Mp3,
        AudioFormat::Mp4,
        AudioFormat::M4a,
        AudioFormat::Wav,
        AudioFormat::Webm,
        AudioFormat::Ogg,
        AudioFormat::Flac,
    ];

    /// Detects the format from a file name's extension, case-insensitively.
    pub fn from_file_name(file_name: &str) -> Result<Self, Error> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .ok_or_else(|| {
                Error::Validation(format!("Audio file '{file_name}' has no extension"))
            })?;

        Self::ALL
            .into_iter()
            .find(|format| format.extension() == extension)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|f| f.extension()).collect();
                Error::Validation(format!(
                    "Unsupported audio format '.{extension}', expected one of: {}",
                    allowed.join(", ")
                ))
            })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Mp4 => "mp4",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Webm => "webm",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Mp4 => "audio/mp4",
            AudioFormat::M4a => "audio/m4a",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Flac => "audio/flac",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// A validated recording ready to hand to a speech-to-text provider.
#[derive(Clone, PartialEq)]
pub struct AudioRequest {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub format: AudioFormat,
    /// ISO-639-1 language hint (e.g. "en")
    pub language: Option<String>,
    /// Vocabulary or context hint passed to providers that support one
    pub prompt: Option<String>,
}

impl fmt::Debug for AudioRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioRequest")
            .field("bytes", &self.bytes.len())
            .field("file_name", &self.file_name)
            .field("format", &self.format)
            .field("language", &self.language)
            .field("prompt", &self.prompt)
            .finish()
    }
}

/// Completed speech-to-text output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub word_count: usize,
    pub duration_seconds: Option<f64>,
    /// Language reported by the provider, when it detects one
    pub language: Option<String>,
}

impl Transcript {
    pub fn new(text: String, duration_seconds: Option<f64>, language: Option<String>) -> Self {
        let word_count = count_words(&text);
        Self {
            text,
            word_count,
            duration_seconds,
            language,
        }
    }
}

/// Whitespace-delimited word count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
