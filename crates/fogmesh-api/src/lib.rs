//! fogmesh-api: REST API for fogmesh.
//!
//! Provides axum route handlers for submitting, inspecting and removing
//! applications, and for listing the nodes currently usable for placement.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/applications` | List deploys |
//! | POST | `/api/v1/applications` | Submit an application (202, deployed in background) |
//! | GET | `/api/v1/applications/{id}` | Get a deploy |
//! | DELETE | `/api/v1/applications/{id}` | Remove an application (202, torn down in background) |
//! | GET | `/api/v1/nodes` | List eligible nodes |

pub mod handlers;
pub mod tasks;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use fogmesh_deploy::{Manager, NodeInventory};

pub use tasks::BackgroundTasks;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<Manager>,
    pub inventory: Arc<dyn NodeInventory>,
    pub tasks: BackgroundTasks,
}

/// Build the complete API router. Deploys and deletes accepted by the
/// router run on `tasks`.
pub fn build_router(
    manager: Arc<Manager>,
    inventory: Arc<dyn NodeInventory>,
    tasks: BackgroundTasks,
) -> Router {
    let api_state = ApiState {
        manager,
        inventory,
        tasks,
    };

    let api_routes = Router::new()
        .route(
            "/applications",
            get(handlers::list_applications).post(handlers::create_application),
        )
        .route(
            "/applications/{id}",
            get(handlers::get_application).delete(handlers::delete_application),
        )
        .route("/nodes", get(handlers::list_nodes))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
