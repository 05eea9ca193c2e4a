use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend};
use crate::host::HostedFile;
use crate::link::Source;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HostedFileResponse {
    pub byte_size: u64,
    pub id: String,
    pub mime_type: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct HostFileParams {
    #[serde(default)]
    pub filename: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Host the raw request body and answer with its public URL.
/// Route: POST /filehost
pub async fn host_file(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<HostFileParams>,
    body: Bytes,
) -> Result<Json<JSend<HostedFileResponse>>, ApiError> {
    if body.len() as u64 > state.config.max_upload_size {
        return Err(ApiError::payload_too_large(format!(
            "File exceeds maximum upload size of {} bytes",
            state.config.max_upload_size
        )));
    }

    let filename = params.filename.filter(|f| !f.trim().is_empty());

    let file = state
        .host
        .host(Source::Bytes(body), filename.as_deref())
        .await?;

    // Resolved against this request's context, captured by the middleware.
    let url = state.host.url(&file)?;

    tracing::debug!(file_id = %file.id, byte_size = file.byte_size, %url, "Hosted file");

    Ok(JSend::success(file_to_response(&file, url.to_string())))
}

// ============================================================================
// Helpers
// ============================================================================

fn file_to_response(file: &HostedFile, url: String) -> HostedFileResponse {
    HostedFileResponse {
        byte_size: file.byte_size,
        id: file.id.clone(),
        mime_type: guess_mime(&file.name),
        name: file.name.clone(),
        url,
    }
}

fn guess_mime(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
