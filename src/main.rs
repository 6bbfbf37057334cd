use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credit_scoring_api::client_store::{ClientStore, PgClientStore};
use credit_scoring_api::config::Config;
use credit_scoring_api::db::Database;
use credit_scoring_api::handlers::AppState;
use credit_scoring_api::import::ImportService;
use credit_scoring_api::prediction_client::MlClient;
use credit_scoring_api::promo::{PromoCatalog, StaticPromoProvider};
use credit_scoring_api::routes::build_router;
use credit_scoring_api::scoring::ScoringService;
use credit_scoring_api::services::ClientService;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool and schema, the
/// prediction client, then serves the HTTP API until SIGINT/SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit_scoring_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connection pool established");
    db.migrate().await?;

    let store: Arc<dyn ClientStore> = Arc::new(PgClientStore::new(db.pool.clone()));

    let ml_client = MlClient::from_config(&config)?;
    match ml_client.health_check().await {
        Ok(()) => tracing::info!("✓ Prediction service reachable: {}", config.ml_base_url),
        Err(e) => tracing::warn!(
            "Prediction service health check failed ({}), scoring requests may fail: {}",
            config.ml_base_url,
            e
        ),
    }

    let promos = Arc::new(StaticPromoProvider::new(PromoCatalog::standard()));

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        client_service: ClientService::new(store.clone()),
        scoring_service: ScoringService::new(store.clone(), Arc::new(ml_client), promos),
        import_service: ImportService::new(store),
    });

    let app = build_router(app_state)?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db.pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
