//! HTTP API module
//! 
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    state::AppState,
    worker::{AssetSource, BackgroundWorker},
};
use handlers::*;

/// Shared handler state
pub struct ApiContext {
    pub state: Arc<AppState>,
    /// Registered background worker, if registration succeeded
    pub worker: Option<Arc<BackgroundWorker>>,
    /// Asset origin used when there is no worker
    pub assets: Arc<dyn AssetSource>,
}

/// Create the HTTP router with all endpoints
pub fn create_router(context: ApiContext) -> Router {
    Router::new()
        .route("/routines", get(list_routines_handler).post(add_routine_handler))
        .route("/routines/stop-all", post(stop_all_handler))
        .route("/routines/:id", delete(delete_routine_handler))
        .route("/routines/:id/start", post(start_routine_handler))
        .route("/routines/:id/stop", post(stop_routine_handler))
        .route("/view", get(view_handler))
        .route("/events", get(events_handler))
        .route(
            "/notifications/permission",
            get(permission_status_handler).post(request_permission_handler),
        )
        .route("/worker/notification-click", post(notification_click_handler))
        .route("/worker/notification-close", post(notification_close_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .fallback(asset_handler)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(context))
}
