//! Per-request context slot.
//!
//! [`capture_request_context`] runs every inbound request inside a
//! `tokio::task_local!` scope holding that request's [`RequestContext`], so code
//! deeper in the handler can call [`current`] instead of threading the request
//! through every signature. Concurrent requests each see only their own value.

use std::future::Future;

use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use thiserror::Error;

tokio::task_local! {
    static CURRENT_REQUEST: RequestContext;
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Header {0} is not valid ASCII")]
    InvalidHeader(&'static str),
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    WebSocket,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::WebSocket => "websocket",
        }
    }
}

/// The slice of an inbound request needed to rebuild a public URL.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub headers: HeaderMap,
    pub path: String,
    pub protocol: Protocol,
    pub scheme: String,
}

impl RequestContext {
    pub fn new(scheme: impl Into<String>, headers: HeaderMap, path: impl Into<String>) -> Self {
        let scheme = scheme.into();
        let protocol = if matches!(scheme.as_str(), "ws" | "wss") {
            Protocol::WebSocket
        } else {
            Protocol::Http
        };
        Self {
            headers,
            path: path.into(),
            protocol,
            scheme,
        }
    }

    /// Shorthand for a context that only carries a host header.
    pub fn with_host(scheme: impl Into<String>, host: &str) -> Result<Self, ContextError> {
        let mut headers = HeaderMap::new();
        let value =
            HeaderValue::from_str(host).map_err(|_| ContextError::InvalidHeader("host"))?;
        headers.insert(header::HOST, value);
        Ok(Self::new(scheme, headers, "/"))
    }

    /// Capture the context of an inbound request.
    ///
    /// The scheme comes from an absolute-form URI, then `X-Forwarded-Proto`, then
    /// defaults to `http`. WebSocket upgrades turn `http`/`https` into `ws`/`wss`.
    pub fn from_request(req: &Request) -> Result<Self, ContextError> {
        let uri = req.uri();
        let mut headers = req.headers().clone();

        let base_scheme = match uri.scheme_str() {
            Some(scheme) => scheme.to_ascii_lowercase(),
            None => match headers.get("x-forwarded-proto") {
                Some(value) => value
                    .to_str()
                    .map_err(|_| ContextError::InvalidHeader("x-forwarded-proto"))?
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase(),
                None => "http".to_string(),
            },
        };

        let secure = match base_scheme.as_str() {
            "http" | "ws" => false,
            "https" | "wss" => true,
            _ => return Err(ContextError::UnsupportedScheme(base_scheme)),
        };

        let protocol = if is_websocket_upgrade(&headers) {
            Protocol::WebSocket
        } else {
            Protocol::Http
        };

        let scheme = match (protocol, secure) {
            (Protocol::Http, false) => "http",
            (Protocol::Http, true) => "https",
            (Protocol::WebSocket, false) => "ws",
            (Protocol::WebSocket, true) => "wss",
        };

        // HTTP/2 carries the host in the :authority pseudo-header.
        if !headers.contains_key(header::HOST) {
            if let Some(authority) = uri.authority() {
                if let Ok(value) = HeaderValue::from_str(authority.as_str()) {
                    headers.insert(header::HOST, value);
                }
            }
        }

        Ok(Self {
            headers,
            path: uri.path().to_string(),
            protocol,
            scheme: scheme.to_string(),
        })
    }

    pub fn host(&self) -> Option<&str> {
        self.headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

/// The context of the request the current task is handling, if any.
pub fn current() -> Option<RequestContext> {
    CURRENT_REQUEST.try_with(|ctx| ctx.clone()).ok()
}

/// Run `fut` with `ctx` as the current request context.
pub async fn scope<F>(ctx: RequestContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_REQUEST.scope(ctx, fut).await
}

/// Run `f` synchronously with `ctx` as the current request context.
pub fn sync_scope<F, R>(ctx: RequestContext, f: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT_REQUEST.sync_scope(ctx, f)
}

/// Middleware that publishes each request's context for downstream handlers.
///
/// A request whose context cannot be parsed is still served, just without a
/// context value.
pub async fn capture_request_context(req: Request, next: Next) -> Response {
    match RequestContext::from_request(&req) {
        Ok(ctx) => {
            tracing::trace!(
                scheme = %ctx.scheme,
                host = ctx.host(),
                path = %ctx.path,
                protocol = ctx.protocol.as_str(),
                "Captured request context"
            );
            scope(ctx, next.run(req)).await
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                method = %req.method(),
                uri = %req.uri(),
                "Failed to capture request context"
            );
            next.run(req).await
        }
    }
}
