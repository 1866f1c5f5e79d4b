use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::params::synthesis::CreateParams;
use crate::{AppState, Error};
use domain::Id;
use log::*;

/// POST run synthesis over the session's transcript
///
/// Returns the stored insight record without calling the extractor unless
/// `force_regenerate` is set.
#[utoipa::path(
    post,
    path = "/sessions/{id}/synthesis",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body(content = CreateParams, description = "Optional; defaults to no regeneration"),
    responses(
        (status = 200, description = "The session's insight record", body = domain::insight_records::Model),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not transcribed or synthesis is already running"),
        (status = 422, description = "Session has no transcript"),
        (status = 502, description = "Extraction provider failed"),
        (status = 503, description = "Extraction provider rejected our credentials or quota")
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    params: Option<Json<CreateParams>>,
) -> Result<impl IntoResponse, Error> {
    let params = params.map(|Json(params)| params).unwrap_or_default();
    debug!(
        "POST synthesis of session {id}, force_regenerate: {}",
        params.force_regenerate
    );

    let insight = app_state
        .orchestrator
        .synthesize(id, params.force_regenerate, None)
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), insight)))
}
