use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::WriterConfig;
use crate::error::EmitError;
use crate::launcher::find_command;
use crate::models::{WriteRequest, WriteResponse, WriteStatus};
use crate::writer::TclWriter;

/// Application state
pub struct AppState {
    writer: TclWriter,
}

impl AppState {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            writer: TclWriter::new(config),
        }
    }
}

/// Build the API router
pub fn create_router(config: WriterConfig) -> Router {
    let state = AppState::new(config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/v1/version", get(version_handler))
        .route("/api/v1/validate", post(validate_handler))
        .route("/api/v1/generate", post(generate_handler))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Root endpoint
async fn root_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mut kinds: Vec<String> = state
        .writer
        .registry()
        .kinds()
        .map(|(namespace, name)| format!("{}/{}", namespace, name))
        .collect();
    kinds.sort();
    Json(json!({
        "service": "OpenSees TCL Writer",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "description": "Partition-aware OpenSees TCL generation for STKO models",
        "supported_entities": kinds
    }))
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let solver = &state.writer.config().opensees_path;
    let solver_available = find_command(solver).is_some();

    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "opensees_available": solver_available,
        "opensees_command": solver
    }))
}

/// Version endpoint
async fn version_handler() -> Json<serde_json::Value> {
    Json(json!({
        "service": "OpenSees TCL Writer",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "solver": "OpenSees / OpenSeesMP"
    }))
}

/// Validate a model without writing it
async fn validate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    tracing::info!("Validating model");

    request.model.validate()?;
    state.writer.resolve_node_dimensions(&request.model)?;

    Ok(Json(json!({
        "valid": true,
        "message": "Model validation passed"
    })))
}

/// Write the TCL files and return them by name
async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<WriteResponse>, ApiError> {
    let model = &request.model;
    tracing::info!("Received generate request");
    tracing::info!(
        "  Nodes: {}, Elements: {}, Processes: {}",
        model.nodes.len(),
        model.elements.len(),
        model.partitions.process_count
    );
    tracing::info!(
        "  Definitions: {}, Element properties: {}, Conditions: {}, Patterns: {}",
        model.definitions.len(),
        model.element_properties.len(),
        model.conditions.len(),
        model.patterns.len()
    );

    let job_id = Uuid::new_v4().to_string();
    let work_dir = TempDir::new().map_err(|e| ApiError::InternalError(e.to_string()))?;
    let report = state.writer.write_model(model, work_dir.path())?;

    let mut files = BTreeMap::new();
    for path in &report.files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ApiError::InternalError(format!("Failed to read {}: {}", name, e)))?;
        files.insert(name, text);
    }
    tracing::info!("Job {} wrote {} files", job_id, files.len());

    Ok(Json(WriteResponse {
        job_id,
        status: WriteStatus::Success,
        files,
        report: Some(report),
        error_message: None,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// API Errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<EmitError> for ApiError {
    fn from(err: EmitError) -> Self {
        match err {
            EmitError::Io(_) | EmitError::Cdata(_) => ApiError::InternalError(err.to_string()),
            other => ApiError::ValidationError(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
