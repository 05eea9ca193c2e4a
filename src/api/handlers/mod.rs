mod admin;
mod files;
mod static_files;

pub use admin::{current_request, health, HealthResponse, RequestContextResponse};
pub use files::{host_file, HostedFileResponse};
pub use static_files::serve_hosted;
