use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, tryon, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.config().server.max_upload_bytes;

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Try-on jobs
        .route("/tryon", post(tryon::create_job).get(tryon::list_jobs))
        .route("/tryon/{id}", get(tryon::get_job).delete(tryon::cancel_job))
        .route("/tryon/{id}/retry", post(tryon::retry_job))
        // Live updates
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
