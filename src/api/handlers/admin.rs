use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::response::{ApiError, JSend};
use crate::context;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestContextResponse {
    pub host: Option<String>,
    pub path: String,
    pub protocol: String,
    pub scheme: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Echo the request context the middleware captured for this request.
/// Route: GET /_internal/request
pub async fn current_request() -> Result<Json<JSend<RequestContextResponse>>, ApiError> {
    let ctx = context::current()
        .ok_or_else(|| ApiError::not_found("No request context captured"))?;

    Ok(JSend::success(RequestContextResponse {
        host: ctx.host().map(str::to_string),
        path: ctx.path.clone(),
        protocol: ctx.protocol.as_str().to_string(),
        scheme: ctx.scheme.clone(),
    }))
}
