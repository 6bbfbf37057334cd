use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    routing::{get, post},
    BoxError, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::errors::AppError;
use crate::handlers::{self, AppState};

/// Maps errors raised by the middleware stack into the JSON error envelope.
async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<Elapsed>() {
        AppError::Timeout("request took too long".to_string())
    } else {
        AppError::InternalError(format!("unhandled middleware error: {}", err))
    }
}

/// Builds the HTTP router with its middleware stack.
///
/// `/health` sits outside the rate limiter. Rate limiting keys on the client
/// IP, so the server must be run with connect info
/// (`into_make_service_with_connect_info::<SocketAddr>()`).
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let config = &state.config;

    let client_routes = Router::new()
        .route(
            "/api/clients",
            get(handlers::list_clients).post(handlers::create_client),
        )
        .route("/api/clients/search", get(handlers::search_clients))
        .route(
            "/api/clients/:id",
            get(handlers::get_client)
                .put(handlers::update_client)
                .delete(handlers::delete_client),
        )
        .route("/api/clients/:id/scoring", get(handlers::get_scoring))
        // Request size limit (prevents memory exhaustion on large bodies)
        .layer(RequestBodyLimitLayer::new(config.import_max_bytes));

    // The multipart extractor enforces its own cap so an oversized upload
    // surfaces as 413 from the handler.
    let import_routes = Router::new().route(
        "/api/clients/import",
        post(handlers::import_clients).layer(DefaultBodyLimit::max(config.import_max_bytes)),
    );

    let mut api_routes = client_routes.merge(import_routes);

    if config.rate_limit_per_second > 0 {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(config.rate_limit_per_second)
                .burst_size(config.rate_limit_burst.max(1))
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
        );
        api_routes = api_routes.layer(GovernorLayer {
            config: governor_conf,
        });
        tracing::info!(
            "Rate limiting enabled: {} req/s per IP, burst {}",
            config.rate_limit_per_second,
            config.rate_limit_burst
        );
    }

    let request_timeout = Duration::from_secs(config.request_timeout_secs);

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(CorsLayer::permissive());

    Ok(app)
}
