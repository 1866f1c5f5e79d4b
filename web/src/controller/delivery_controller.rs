use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;

use crate::controller::ApiResponse;
use crate::params::delivery::CreateParams;
use crate::{AppState, Error};
use domain::Id;
use log::*;

/// POST email the insight record to the attendees or an explicit recipient list
#[utoipa::path(
    post,
    path = "/sessions/{id}/delivery",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body(content = CreateParams, description = "Optional; defaults to the attendees"),
    responses(
        (status = 200, description = "Delivered; the insight record with its delivery tracking", body = domain::insight_records::Model),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not synthesized, already delivered, or delivery is running"),
        (status = 422, description = "No valid recipients or the record cannot be rendered"),
        (status = 502, description = "Mail transport failed"),
        (status = 503, description = "Mail transport rejected our credentials")
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    params: Option<Json<CreateParams>>,
) -> Result<impl IntoResponse, Error> {
    let params = params.map(|Json(params)| params).unwrap_or_default();
    debug!(
        "POST delivery of session {id}, force_resend: {}",
        params.force_resend
    );

    let insight = app_state
        .orchestrator
        .deliver(id, params.recipients, params.force_resend, None)
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), insight)))
}

/// GET the delivery email as HTML without sending it
#[utoipa::path(
    get,
    path = "/sessions/{id}/delivery/preview",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Rendered HTML body", body = String, content_type = "text/html"),
        (status = 404, description = "Session not found or not synthesized yet"),
        (status = 422, description = "The insight record cannot be rendered")
    )
)]
pub async fn preview(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET delivery preview of session: {id}");

    let rendered = app_state.orchestrator.preview(id).await?;

    Ok(Html(rendered.html_body))
}
