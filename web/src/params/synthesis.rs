use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateParams {
    /// Overwrite an existing insight record instead of returning it
    #[serde(default)]
    pub force_regenerate: bool,
}
