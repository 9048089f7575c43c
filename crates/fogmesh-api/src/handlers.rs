//! REST API handlers.
//!
//! Deploy and delete requests are accepted immediately and carried out on
//! the router's [`BackgroundTasks`](crate::BackgroundTasks); their outcome is
//! visible through the read endpoints and the daemon log.

use std::collections::HashSet;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{info, warn};

use fogmesh_core::Application;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Applications ───────────────────────────────────────────────

/// GET /api/v1/applications
pub async fn list_applications(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.manager.deployments().await)
}

/// GET /api/v1/applications/{id}
pub async fn get_application(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.manager.get_deploy_by_application_id(&id).await {
        Some(deploy) => ApiResponse::ok(deploy).into_response(),
        None => error_response("application not found", StatusCode::NOT_FOUND).into_response(),
    }
}

/// POST /api/v1/applications
pub async fn create_application(
    State(state): State<ApiState>,
    Json(app): Json<Application>,
) -> impl IntoResponse {
    if let Err(msg) = validate(&app) {
        return error_response(&msg, StatusCode::BAD_REQUEST).into_response();
    }

    let id = app.id.clone();
    let manager = state.manager.clone();
    state.tasks.spawn(async move {
        let app_id = app.id.clone();
        match manager.add_application(app).await {
            Ok(()) => info!(app = %app_id, "deploy request completed"),
            Err(e) => warn!(app = %app_id, error = %e, "deploy request failed"),
        }
    });

    info!(app = %id, "deploy request accepted");
    (
        StatusCode::ACCEPTED,
        ApiResponse::ok(json!({ "id": id, "status": "deploying" })),
    )
        .into_response()
}

/// DELETE /api/v1/applications/{id}
pub async fn delete_application(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.manager.get_deploy_by_application_id(&id).await.is_none() {
        return error_response("application not found", StatusCode::NOT_FOUND).into_response();
    }

    let manager = state.manager.clone();
    let app_id = id.clone();
    state.tasks.spawn(async move {
        match manager.delete_application(&app_id).await {
            Ok(()) => info!(app = %app_id, "delete request completed"),
            Err(e) => warn!(app = %app_id, error = %e, "delete request failed"),
        }
    });

    info!(app = %id, "delete request accepted");
    (
        StatusCode::ACCEPTED,
        ApiResponse::ok(json!({ "id": id, "status": "deleting" })),
    )
        .into_response()
}

// ── Nodes ──────────────────────────────────────────────────────

/// GET /api/v1/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.inventory.nodes().await)
}

/// Reject submissions that could never be placed.
fn validate(app: &Application) -> Result<(), String> {
    if app.id.trim().is_empty() {
        return Err("application id must not be empty".to_string());
    }
    if app.services.is_empty() {
        return Err("application must have at least one service".to_string());
    }

    let mut ids = HashSet::new();
    for service in &app.services {
        if !ids.insert(service.id.as_str()) {
            return Err(format!("duplicate service id: {}", service.id));
        }
        if service.images.is_empty() {
            return Err(format!("service {} has no images", service.id));
        }
    }

    let referenced = app
        .flows
        .iter()
        .flat_map(|f| [&f.src, &f.dst])
        .chain(app.max_latencies.iter().flat_map(|l| l.chain.iter()));
    for id in referenced {
        if !ids.contains(id.as_str()) {
            return Err(format!("unknown service referenced: {id}"));
        }
    }

    Ok(())
}
