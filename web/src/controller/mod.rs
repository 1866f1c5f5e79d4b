use serde::Serialize;
pub(crate) mod attendee_controller;
pub(crate) mod delivery_controller;
pub(crate) mod health_check_controller;
pub(crate) mod session_controller;
pub(crate) mod synthesis_controller;
pub(crate) mod transcription_controller;

#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T) -> Self {
        Self {
            status_code,
            data: Some(data),
        }
    }

    pub fn no_content(status_code: u16) -> ApiResponse<()> {
        ApiResponse {
            status_code,
            data: None,
        }
    }
}
