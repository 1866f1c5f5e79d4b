use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::params::attendee::CreateParams;
use crate::{AppState, Error};
use domain::Id;
use log::*;

/// GET the attendees of a session, organizers first
#[utoipa::path(
    get,
    path = "/sessions/{id}/attendees",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Successfully retrieved the attendees", body = [domain::attendees::Model]),
        (status = 404, description = "Session not found")
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET attendees of session: {id}");

    let attendees = app_state.orchestrator.attendees(id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), attendees)))
}

/// POST add an attendee to a session
#[utoipa::path(
    post,
    path = "/sessions/{id}/attendees",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = CreateParams,
    responses(
        (status = 201, description = "Successfully added the attendee", body = domain::attendees::Model),
        (status = 404, description = "Session not found"),
        (status = 422, description = "Blank name or invalid email address")
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<CreateParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST add attendee {} to session: {id}", params.email);

    let attendee = app_state
        .orchestrator
        .add_attendee(id, params.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), attendee)),
    ))
}
