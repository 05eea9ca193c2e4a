//! filehost - Hand local files to a temporary HTTP file server and get public URLs back
//!
//! This crate provides:
//! - A process-lifetime hosting directory served under `/filehost/`
//! - Link-or-copy placement of bytes, buffers, paths and open files
//! - Per-request context capture so URLs follow the host the request came in on
//! - An optional fixed base URL for deployments behind a reverse proxy

pub mod api;
pub mod config;
pub mod context;
pub mod host;
pub mod link;
pub mod public_url;
#[cfg(test)]
pub mod testutil;

use config::Config;
use host::FileHost;

pub use host::HostedFile;
pub use link::{HostError, LinkKind, LinkMode, LinkPolicy, Source};
pub use public_url::UrlError;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub host: FileHost,
}
