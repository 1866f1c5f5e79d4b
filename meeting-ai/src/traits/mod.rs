pub mod analysis;
pub mod notification;
pub mod transcription;
