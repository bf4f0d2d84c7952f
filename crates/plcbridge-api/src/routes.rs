//! Request routing.
//!
//! | Method | Path | Answer |
//! |---|---|---|
//! | GET | `/api/siemens/temperatur/{ist,soll,differenz}/latest` | reading or 204 |
//! | GET | `/api/siemens/temperatur/{ist,soll,differenz}/all` | array, newest first |
//! | GET | `/api/wago/status/latest` | status or 204 |
//! | GET | `/api/wago/status/latest/binary` | same as above |
//! | POST | `/api/wago/control` | `{"code": n}` → ack, or 400 |
//! | GET | `/api/health` | health snapshot |
//!
//! Every response carries permissive CORS headers and CORS preflights are
//! answered by [`CorsLayer`].  Unknown paths are 404; a known path with the
//! wrong method is 405.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use plcbridge_core::{CONTROL_TOPIC, CommandPublisher, HealthService, QueryService};
use plcbridge_types::{BridgeError, TemperatureKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Services the routes read from and write to.
pub struct ApiState {
    pub query: QueryService,
    pub commands: CommandPublisher,
    pub health: HealthService,
}

/// Build the API router over `state`.
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/siemens/temperatur/:kind/latest", get(latest_reading))
        .route("/api/siemens/temperatur/:kind/all", get(all_readings))
        .route("/api/wago/status/latest", get(latest_status))
        .route("/api/wago/status/latest/binary", get(latest_status))
        .route("/api/wago/control", post(control))
        .route("/api/health", get(health))
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error answer: a status code with an `{"error": message}` body.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        let status = match &err {
            BridgeError::CommandOutOfRange { .. } | BridgeError::Format { .. } => {
                StatusCode::BAD_REQUEST
            }
            BridgeError::UnknownKind(_) | BridgeError::UnknownTopic(_) => StatusCode::NOT_FOUND,
            BridgeError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ControlRequest {
    #[serde(alias = "command")]
    code: i64,
}

#[derive(Serialize)]
struct ControlAck {
    message: String,
    code: u8,
    topic: &'static str,
}

async fn latest_reading(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
) -> Result<Response, ApiError> {
    let kind: TemperatureKind = kind.parse()?;
    match state.query.get_latest(kind).map_err(ApiError::internal)? {
        Some(reading) => Ok(Json(reading).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn all_readings(
    State(state): State<Arc<ApiState>>,
    Path(kind): Path<String>,
) -> Result<Response, ApiError> {
    let kind: TemperatureKind = kind.parse()?;
    let readings = state.query.get_all(kind).map_err(ApiError::internal)?;
    Ok(Json(readings).into_response())
}

async fn latest_status(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.query.get_latest_status().map_err(ApiError::internal)? {
        Some(status) => Ok(Json(status).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn control(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<Json<ControlAck>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "malformed control request");
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::new(
            status,
            format!("Invalid control request: {}", rejection.body_text()),
        )
    })?;
    info!(code = request.code, "POST /api/wago/control");

    let command = state.commands.send_command(request.code).await?;
    Ok(Json(ControlAck {
        message: format!("Command sent: {}", command.code()),
        code: command.code(),
        topic: CONTROL_TOPIC,
    }))
}

async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.health.snapshot())
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found")
}
