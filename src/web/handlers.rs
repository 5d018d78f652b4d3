//! HTTP request handlers.

use super::AppState;
use crate::checker::run_immediate_check;
use crate::db::{DbError, Service};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::Deserialize;

// ============================================================================
// Meta
// ============================================================================

/// Liveness probe. Returns 200 if the app process is running.
pub async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================================
// API: Services
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub url: String,
}

pub async fn handle_create_service(
    State(state): State<AppState>,
    Json(req): Json<CreateServiceRequest>,
) -> impl IntoResponse {
    let name = req.name.trim();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Service name cannot be empty").into_response();
    }

    let url = match validate_service_url(&req.url) {
        Ok(url) => url,
        Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
    };

    let mut service = Service {
        id: 0,
        name: name.to_string(),
        url,
        created_at: Utc::now(),
    };

    match state.store.add_service(&mut service) {
        Ok(_) => {
            tracing::info!(
                "Created service id={} name={:?} url={:?}",
                service.id,
                service.name,
                service.url
            );

            // Fire-and-forget: the response returns before the first check
            // completes, and the check's failure is never surfaced here
            let prober = state.prober.clone();
            let store = state.store.clone();
            let service_id = service.id;
            tokio::spawn(async move {
                run_immediate_check(&prober, &store, service_id).await;
            });

            (StatusCode::CREATED, Json(service)).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_list_services(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_services() {
        Ok(services) => Json(services).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_get_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_service(id) {
        Ok(service) => Json(service).into_response(),
        Err(DbError::NotFound) => (StatusCode::NOT_FOUND, "Service not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_delete_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.delete_service(id) {
        Ok(()) => {
            tracing::info!("Deleted service id={}", id);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(DbError::NotFound) => (StatusCode::NOT_FOUND, "Service not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Check History
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn handle_get_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    // Unknown services get a 404, not an empty list
    if let Err(e) = state.store.get_service(id) {
        return match e {
            DbError::NotFound => (StatusCode::NOT_FOUND, "Service not found").into_response(),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
        };
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);

    match state.store.get_history(id, limit, offset) {
        Ok(history) => Json(history).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Validate and normalize a target URL.
///
/// Only absolute http/https URLs with a host are accepted.
fn validate_service_url(raw: &str) -> Result<String, String> {
    let url = reqwest::Url::parse(raw).map_err(|e| format!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("Unsupported URL scheme: {}", other)),
    }
    if url.host_str().is_none() {
        return Err("URL must have a host".to_string());
    }

    Ok(url.to_string())
}
