//! Shared test helpers for filehost unit tests.

use std::sync::Arc;

use url::Url;

use crate::config::{Config, HostingConfig, ServerConfig};
use crate::host::{FileHost, HostingDir};
use crate::link::{LinkPolicy, LinkResolver};
use crate::AppState;

/// Create a test AppState whose hosting directory lives inside `temp_dir`.
pub fn test_state(temp_dir: &tempfile::TempDir, host_override: Option<Url>) -> Arc<AppState> {
    let config = Config {
        hosting: HostingConfig {
            host_override: host_override.clone(),
            tmp_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        },
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
        },
        max_upload_size: 1024 * 1024, // 1MB for tests
    };

    let dir = HostingDir::create(Some(temp_dir.path())).expect("Failed to create hosting dir");
    let host = FileHost::new(dir, LinkResolver::new(LinkPolicy::copy()), host_override);

    Arc::new(AppState { config, host })
}
