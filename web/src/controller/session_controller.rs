use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::controller::ApiResponse;
use crate::params::session::{CreateParams, IndexParams};
use crate::{AppState, Error};
use domain::{attendees, sessions, Id};
use log::*;

/// A newly created session together with its attendees.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedSession {
    pub session: sessions::Model,
    pub attendees: Vec<attendees::Model>,
}

/// GET sessions, optionally only those in one state or failed at one stage
#[utoipa::path(
    get,
    path = "/sessions",
    params(IndexParams),
    responses(
        (status = 200, description = "Successfully retrieved the matching sessions", body = [domain::sessions::Model]),
        (status = 422, description = "failed_stage combined with a state other than failed")
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET all sessions");
    debug!("Filter Params: {:?}", params);

    let sessions = app_state.orchestrator.list_sessions(params.into()).await?;

    debug!("Found {} session(s)", sessions.len());

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), sessions)))
}

/// POST create a new meeting session
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateParams,
    responses(
        (status = 201, description = "Successfully created a new session", body = CreatedSession),
        (status = 422, description = "Blank title or invalid attendee"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    Json(params): Json<CreateParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Create a new session: {}", params.title);

    let (session, attendees) = app_state.orchestrator.create_session(params.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            StatusCode::CREATED.into(),
            CreatedSession { session, attendees },
        )),
    ))
}

/// GET a session with its pipeline state, transcript and last error
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Successfully retrieved the session", body = domain::sessions::Model),
        (status = 404, description = "Session not found")
    )
)]
pub async fn read(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET session by id: {id}");

    let session = app_state.orchestrator.status(id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), session)))
}

/// DELETE a session with its attendees and insight record
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Successfully deleted the session"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn delete(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("DELETE session by id: {id}");

    app_state.orchestrator.delete_session(id).await?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        json!({ "id": id }),
    )))
}

/// GET the insight record produced by synthesis
#[utoipa::path(
    get,
    path = "/sessions/{id}/insight",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Successfully retrieved the insight record", body = domain::insight_records::Model),
        (status = 404, description = "Session not found or not synthesized yet")
    )
)]
pub async fn insight(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET insight record of session: {id}");

    let insight = app_state.orchestrator.insight(id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), insight)))
}

/// GET the estimated provider cost of a session
#[utoipa::path(
    get,
    path = "/sessions/{id}/cost_estimate",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Cost estimate from the stored audio duration and word count", body = domain::pipeline::CostEstimate),
        (status = 404, description = "Session not found")
    )
)]
pub async fn cost_estimate(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET cost estimate of session: {id}");

    let estimate = app_state.orchestrator.estimate_costs(id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), estimate)))
}
