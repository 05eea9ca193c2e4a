use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::api::response::ApiError;
use crate::AppState;

/// Serve a hosted file by its public name.
/// Route: GET /filehost/*name
///
/// The body is streamed from disk and `Range` requests are honoured.
pub async fn serve_hosted(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(name): axum::extract::Path<String>,
    req: Request,
) -> Result<Response, ApiError> {
    let path = state
        .host
        .dir()
        .resolve(&name)
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    // Directories (the `<id>/` of a named upload) and anything else that is not a
    // regular file are not servable.
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(ApiError::not_found("File not found")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to stat file: {e}"))),
    }

    let mut response = ServeFile::new(&path)
        .oneshot(req)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read file: {e}")))?
        .map(Body::new)
        .into_response();

    if response.status().is_success() {
        let headers = response.headers_mut();

        let filename = name.rsplit('/').next().unwrap_or(&name);
        if let Ok(value) = format!("inline; filename=\"{filename}\"").parse() {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }

        // Hosted files never change once written.
        headers.insert(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("public, max-age=3600"),
        );
    }

    Ok(response)
}
