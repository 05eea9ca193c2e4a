use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::context::capture_request_context;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_size).unwrap_or(usize::MAX);

    Router::new()
        // Hosted files
        .route(
            "/filehost",
            post(handlers::host_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/filehost/*name", get(handlers::serve_hosted))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .route("/_internal/request", get(handlers::current_request))
        .layer(middleware::from_fn(capture_request_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
