//! JSend envelopes for every JSON answer the API gives.
//!
//! `success` carries `data`, `fail` (4xx) carries `data.message`, `error` (5xx)
//! carries a top-level `message`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::link::HostError;
use crate::public_url::UrlError;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JSend<T: Serialize> {
    Success { data: T },
    Fail { data: FailData },
    Error { message: String },
}

#[derive(Debug, Serialize)]
pub struct FailData {
    pub message: String,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend::Success { data })
    }
}

/// Handler error rendered as a JSend `fail` or `error` depending on the status class.
#[derive(Debug)]
pub struct ApiError {
    message: String,
    status: StatusCode,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body: JSend<()> = if self.status.is_server_error() {
            JSend::Error {
                message: self.message,
            }
        } else {
            JSend::Fail {
                data: FailData {
                    message: self.message,
                },
            }
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<HostError> for ApiError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::InvalidSource(_) | HostError::InvalidFilename(_) => {
                ApiError::bad_request(e.to_string())
            }
            HostError::Io(_) | HostError::Join(_) => {
                ApiError::internal(format!("Failed to host file: {e}"))
            }
        }
    }
}

impl From<UrlError> for ApiError {
    fn from(e: UrlError) -> Self {
        tracing::error!(error = %e, "Failed to build public URL");
        ApiError::internal(e.to_string())
    }
}

/// Query-string extractor parsed with `serde_qs`; rejects with a JSend `fail`.
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, ApiError> {
        serde_qs::from_str(parts.uri.query().unwrap_or_default())
            .map(AppQuery)
            .map_err(|e| ApiError::bad_request(format!("Invalid query parameter: {e}")))
    }
}
