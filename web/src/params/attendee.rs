use domain::NewAttendee;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateParams {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_organizer: bool,
}

impl From<CreateParams> for NewAttendee {
    fn from(params: CreateParams) -> Self {
        NewAttendee {
            name: params.name,
            email: params.email,
            is_organizer: params.is_organizer,
        }
    }
}
