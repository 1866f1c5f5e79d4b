use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use domain::pipeline::Orchestrator;
use log::*;
use service::config::Config;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

mod controller;
mod error;
mod params;
mod router;

pub use error::{Error, Result};

/// Shared by every handler. Cloning is cheap: the orchestrator is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            config,
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("Ignoring invalid CORS origin {origin}: {err}");
                None
            }
        })
        .collect();
    info!("CORS allowed origins: {origins:?}");

    CorsLayer::new()
        .allow_methods([Method::DELETE, Method::GET, Method::OPTIONS, Method::POST])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .allow_origin(AllowOrigin::list(origins))
}

/// Serves the API until the process receives Ctrl-C.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let listen_addr = format!("{}:{}", app_state.config.interface, app_state.config.port);
    let cors_layer = cors_layer(&app_state.config);

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Server starting... listening for connections on http://{listen_addr}");

    axum::serve(listener, router::define_routes(app_state).layer(cors_layer))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for the shutdown signal: {err}");
            }
            info!("Shutting down");
        })
        .await
}
