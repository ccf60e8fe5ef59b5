//! HTTP surface of the workflow service

pub mod error;
pub mod routes;

use axum::extract::Request;
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use workflow_core::{WorkflowEngine, WorkflowStore};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: WorkflowEngine<dyn WorkflowStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            engine: WorkflowEngine::new(store),
        }
    }
}

/// Build the router with every workflow route
pub fn app(state: AppState) -> Router {
    Router::new()
        .route(
            "/workflows",
            post(routes::request_transition)
                .put(routes::configure_workflow)
                .get(routes::workflow_status),
        )
        .route("/workflows/config", get(routes::active_config))
        .route("/workflows/approvals/:approval_id/decision", post(routes::decide_approval))
        .route("/health", get(routes::health))
        .layer(from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
