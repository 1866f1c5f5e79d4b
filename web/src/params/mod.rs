pub(crate) mod attendee;
pub(crate) mod delivery;
pub(crate) mod session;
pub(crate) mod synthesis;
pub(crate) mod transcription;
