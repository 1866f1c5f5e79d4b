use domain::pipeline::{Orchestrator, PipelineSettings};
use domain::store::{DatabaseStore, InMemoryStore, RecordStore};
use log::*;
use migration::{Migrator, MigratorTrait};
use service::config::{Config, RecordStoreKind};
use service::logging::Logger;
use std::sync::Arc;

async fn record_store(config: &Config) -> Arc<dyn RecordStore> {
    match config.record_store {
        RecordStoreKind::Memory => {
            warn!("Using the in-memory record store; sessions are lost on restart");
            Arc::new(InMemoryStore::new())
        }
        RecordStoreKind::Postgres => {
            let db = match service::init_database(config).await {
                Ok(db) => Arc::new(db),
                Err(e) => {
                    error!("Failed to establish database connection: {e}");
                    std::process::exit(1);
                }
            };

            if config.run_migrations {
                info!("Applying pending database migrations...");
                if let Err(e) = Migrator::up(db.as_ref(), None).await {
                    error!("Failed to apply database migrations: {e}");
                    std::process::exit(1);
                }
            }

            Arc::new(DatabaseStore::new(db))
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting meeting synthesis service [{}]",
        config.runtime_env()
    );

    let adapters = match domain::providers::adapters(&config) {
        Ok(adapters) => adapters,
        Err(e) => {
            error!("Failed to configure providers: {e}");
            std::process::exit(1);
        }
    };

    let store = record_store(&config).await;
    let orchestrator = Orchestrator::new(store, adapters, PipelineSettings::from_config(&config));

    if let Err(e) = web::init_server(web::AppState::new(config, orchestrator)).await {
        error!("Server stopped with an error: {e}");
        std::process::exit(1);
    }
}
