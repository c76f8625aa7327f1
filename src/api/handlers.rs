//! HTTP request handlers

use super::twiml;
use super::types::{
    ErrorResponse, HealthResponse, HistoryResponse, InboundMessageForm, ParseRequest,
    ResetResponse,
};
use super::AppState;
use crate::classifier::{Classification, ClassificationFailure};
use crate::runtime::{SessionStore, StoreError};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};

const SERVICE_NAME: &str = "marketplace-bot";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Messaging gateway webhook
        .route("/whatsapp", post(whatsapp_webhook))
        // Operator endpoints
        .route("/history/:phone", get(get_history))
        .route("/reset/:phone", post(reset_user))
        .route("/parse", post(parse_message))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

async fn whatsapp_webhook(
    State(state): State<AppState>,
    Form(form): Form<InboundMessageForm>,
) -> Result<Response, AppError> {
    let phone = form.phone();
    let message = form.body.trim();
    if phone.is_empty() || message.is_empty() {
        tracing::warn!("Webhook request without phone or message");
        return Err(AppError::BadRequest("Missing phone or message".to_string()));
    }

    tracing::info!(user_id = %phone, "Incoming message");
    let reply = state.runtime.handle_message(phone, message).await;

    Ok((
        [(header::CONTENT_TYPE, "application/xml")],
        twiml::render(&reply),
    )
        .into_response())
}

// ============================================================
// Operator endpoints
// ============================================================

async fn get_history(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let messages = state.runtime.history(&phone).await?;
    Ok(Json(HistoryResponse { phone, messages }))
}

async fn reset_user(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<ResetResponse>, AppError> {
    state.runtime.reset(&phone).await?;
    Ok(Json(ResetResponse {
        status: "reset",
        phone,
    }))
}

/// Classify a message without touching any dialogue state
async fn parse_message(
    State(state): State<AppState>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<Classification>, AppError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("No message provided".to_string()));
    }
    let classification = state.runtime.runtime().classify("", message).await?;
    Ok(Json(classification))
}

async fn health(State(state): State<AppState>) -> Response {
    let store_ok = match state.runtime.runtime().store().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, degraded = true, "Health check: session store unavailable");
            false
        }
    };

    let body = HealthResponse {
        status: if store_ok { "ok" } else { "degraded" },
        service: SERVICE_NAME,
        timestamp: chrono::Utc::now().to_rfc3339(),
        store: if store_ok { "ok" } else { "unavailable" },
    };
    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

async fn get_version() -> &'static str {
    concat!("marketplace-bot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Upstream(String),
    Unavailable(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, degraded = true, "Session store unavailable");
        AppError::Unavailable(e.to_string())
    }
}

impl From<ClassificationFailure> for AppError {
    fn from(e: ClassificationFailure) -> Self {
        AppError::Upstream(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
