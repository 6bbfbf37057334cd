use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::client_store::validate_id;
use crate::config::Config;
use crate::errors::AppError;
use crate::import::ImportService;
use crate::models::*;
use crate::scoring::ScoringService;
use crate::services::ClientService;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    pub client_service: ClientService,
    pub scoring_service: ScoringService,
    pub import_service: ImportService,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Extracts a positive client id from the path.
fn client_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    let Path(id) = path.map_err(|_| AppError::BadRequest("invalid client ID".to_string()))?;
    validate_id(id)?;
    Ok(id)
}

/// Keeps the size cap visible instead of folding it into a generic 400.
fn multipart_error(err: MultipartError, max_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("file too large: limit is {} bytes", max_bytes))
    } else {
        AppError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::BadRequest(format!("invalid request body: {}", e.body_text())))
}

/// GET /api/clients
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<ClientResponse>>, AppError> {
    let (limit, offset) = params.resolve();
    tracing::info!("GET /api/clients - limit: {}, offset: {}", limit, offset);

    let clients = state.client_service.list_clients(limit, offset).await?;
    Ok(Json(clients.into_iter().map(ClientResponse::from).collect()))
}

/// POST /api/clients
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateClientRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ClientResponse>), AppError> {
    let req = json_body(body)?;
    tracing::info!("POST /api/clients - {} {}", req.first_name, req.last_name);

    let client = state.client_service.create_client(req).await?;
    Ok((StatusCode::CREATED, Json(client.into())))
}

/// GET /api/clients/search
///
/// Name fields match case-insensitive substrings, `birth_date` (`DD-MM-YYYY`)
/// matches exactly. At least one parameter must be present.
pub async fn search_clients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ClientResponse>>, AppError> {
    tracing::info!("GET /api/clients/search - params: {:?}", params);

    let clients = state.client_service.search_clients(&params).await?;
    Ok(Json(clients.into_iter().map(ClientResponse::from).collect()))
}

/// GET /api/clients/:id
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ClientResponse>, AppError> {
    let id = client_id(path)?;
    tracing::info!("GET /api/clients/{}", id);

    let client = state.client_service.get_client(id).await?;
    Ok(Json(client.into()))
}

/// PUT /api/clients/:id
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateClientRequest>, JsonRejection>,
) -> Result<Json<ClientResponse>, AppError> {
    let id = client_id(path)?;
    let req = json_body(body)?;
    tracing::info!("PUT /api/clients/{}", id);

    let client = state.client_service.update_client(id, req).await?;
    Ok(Json(client.into()))
}

/// DELETE /api/clients/:id
pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = client_id(path)?;
    tracing::info!("DELETE /api/clients/{}", id);

    state.client_service.delete_client(id).await?;
    Ok(Json(SuccessResponse {
        message: format!("client {} deleted", id),
    }))
}

/// GET /api/clients/:id/scoring
pub async fn get_scoring(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ScoringResult>, AppError> {
    let id = client_id(path)?;
    tracing::info!("GET /api/clients/{}/scoring", id);

    let result = state.scoring_service.calculate_scoring(id).await?;
    Ok(Json(result))
}

/// POST /api/clients/import
///
/// Expects a multipart form with the CSV in the `file` field.
pub async fn import_clients(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImportStats>, AppError> {
    let mut multipart = multipart
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e.body_text())))?;
    let max_bytes = state.config.import_max_bytes;
    let mut data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload.csv").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e, max_bytes))?;
            tracing::info!(
                "POST /api/clients/import - {} ({} bytes)",
                file_name,
                bytes.len()
            );
            data = Some(bytes);
            break;
        }
    }

    let data = data.ok_or_else(|| AppError::BadRequest("file field is required".to_string()))?;
    let stats = state.import_service.import_csv(&data).await?;
    Ok(Json(stats))
}
