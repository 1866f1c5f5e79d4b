//! Meeting AI abstraction layer for transcription, insight extraction and notification providers.
//!
//! This crate provides trait-based abstractions for the meeting synthesis pipeline:
//! - Speech-to-text transcription of an uploaded recording
//! - LLM-powered extraction of summary, decisions, action items, questions and topics
//! - Delivery of the rendered result to a list of recipients
//!
//! The design is provider-agnostic, enabling applications to swap between
//! different service providers (Whisper, AssemblyAI, OpenAI, SMTP, MailerSend) without
//! changing application code. Every provider maps its native failures onto [`Error`],
//! whose [`Error::kind`] decides whether a call is retried.

pub mod error;
pub mod pricing;
pub mod retry;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{Error, FailureKind};
pub use retry::RetryPolicy;
