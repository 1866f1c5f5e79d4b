use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateParams {
    /// Replaces the attendee list when present
    pub recipients: Option<Vec<String>>,
    /// Send again to a session that was already delivered
    #[serde(default)]
    pub force_resend: bool,
}
