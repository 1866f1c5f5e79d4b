pub mod insights;
pub mod notification;
pub mod transcription;
