use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::controller::{
    attendee_controller, delivery_controller, health_check_controller, session_controller,
    synthesis_controller, transcription_controller,
};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

/// Room for the multipart framing and text fields around the recording itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Meeting Synthesis API"
        ),
        paths(
            attendee_controller::index,
            attendee_controller::create,
            delivery_controller::create,
            delivery_controller::preview,
            health_check_controller::health_check,
            health_check_controller::providers,
            session_controller::index,
            session_controller::create,
            session_controller::read,
            session_controller::delete,
            session_controller::insight,
            session_controller::cost_estimate,
            synthesis_controller::create,
            transcription_controller::create,
        ),
        components(
            schemas(
                domain::attendees::Model,
                domain::insight_records::Model,
                domain::sessions::Model,
                domain::pipeline::CostEstimate,
                domain::pipeline::ProviderHealth,
                domain::pipeline::ProviderStatus,
                crate::error::ErrorBody,
                crate::params::attendee::CreateParams,
                crate::params::delivery::CreateParams,
                crate::params::session::CreateParams,
                crate::params::synthesis::CreateParams,
                crate::params::transcription::UploadForm,
                session_controller::CreatedSession,
            )
        ),
        tags(
            (name = "meeting_synthesis", description = "Meeting transcription, synthesis and delivery API")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(session_routes(app_state.clone()))
        .merge(attendee_routes(app_state.clone()))
        .merge(stage_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .route(
            "/health/providers",
            get(health_check_controller::providers),
        )
        .with_state(app_state)
}

fn session_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/sessions",
            get(session_controller::index).post(session_controller::create),
        )
        .route(
            "/sessions/{id}",
            get(session_controller::read).delete(session_controller::delete),
        )
        .route("/sessions/{id}/insight", get(session_controller::insight))
        .route(
            "/sessions/{id}/cost_estimate",
            get(session_controller::cost_estimate),
        )
        .with_state(app_state)
}

fn attendee_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/sessions/{id}/attendees",
            get(attendee_controller::index).post(attendee_controller::create),
        )
        .with_state(app_state)
}

fn stage_routes(app_state: AppState) -> Router {
    let upload_limit = app_state
        .config
        .max_audio_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/sessions/{id}/transcription",
            post(transcription_controller::create).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/sessions/{id}/synthesis",
            post(synthesis_controller::create),
        )
        .route("/sessions/{id}/delivery", post(delivery_controller::create))
        .route(
            "/sessions/{id}/delivery/preview",
            get(delivery_controller::preview),
        )
        .with_state(app_state)
}
