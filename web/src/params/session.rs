use domain::pipeline::CreateSession;
use domain::{pipeline_stage::PipelineStage, session_state::SessionState, SessionFilter};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::attendee;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateParams {
    pub title: String,
    pub description: Option<String>,
    /// ISO-639-1 language of the meeting, used as the transcription hint
    pub language: Option<String>,
    #[serde(default)]
    pub attendees: Vec<attendee::CreateParams>,
}

impl From<CreateParams> for CreateSession {
    fn from(params: CreateParams) -> Self {
        CreateSession {
            title: params.title,
            description: params.description,
            language: params.language,
            attendees: params.attendees.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IndexParams {
    /// Only sessions in this state
    pub state: Option<SessionState>,
    /// Only sessions failed at this stage
    pub failed_stage: Option<PipelineStage>,
    /// Case-insensitive part of the title
    pub title: Option<String>,
    /// At most this many sessions, newest first (default 50, max 200)
    pub limit: Option<u64>,
}

impl From<IndexParams> for SessionFilter {
    fn from(params: IndexParams) -> Self {
        SessionFilter {
            state: params.state,
            failed_stage: params.failed_stage,
            title: params.title,
            limit: params.limit,
        }
    }
}
