use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::link::{LinkKind, LinkMode, LinkPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub hosting: HostingConfig,
    pub server: ServerConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone)]
pub struct HostingConfig {
    /// Fixed public base URL (e.g. a reverse proxy). Wins over the request's host header.
    pub host_override: Option<Url>,
    pub link_kind: LinkKind,
    pub link_mode: LinkMode,
    /// Parent directory for the hosting directory, defaults to the system temp dir.
    pub tmp_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            host_override: None,
            link_kind: LinkKind::Hard,
            link_mode: LinkMode::Always,
            tmp_dir: None,
        }
    }
}

impl HostingConfig {
    pub fn link_policy(&self) -> LinkPolicy {
        LinkPolicy {
            kind: self.link_kind,
            mode: self.link_mode,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let max_upload_size = lookup("MAX_UPLOAD_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let host_override = lookup("FILEHOST_HOST_OVERRIDE")
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_host_override(&s))
            .transpose()?;

        let link_mode = match lookup("FILEHOST_LINK_FILE") {
            Some(value) => parse_link_mode(&value)?,
            None => LinkMode::Always,
        };

        let link_kind = match lookup("FILEHOST_LINK_TYPE") {
            Some(value) => parse_link_kind(&value)?,
            None => LinkKind::Hard,
        };

        let tmp_dir = lookup("FILEHOST_TMP_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let config = Config {
            hosting: HostingConfig {
                host_override,
                link_kind,
                link_mode,
                tmp_dir,
            },
            server: ServerConfig { bind_address },
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than zero".to_string(),
            ));
        }

        if let Some(ref dir) = self.hosting.tmp_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(ConfigError::ValidationError(format!(
                    "FILEHOST_TMP_DIR {} is not a directory",
                    dir.display()
                )));
            }
        }

        if self.hosting.host_override.is_none() {
            tracing::debug!(
                "No FILEHOST_HOST_OVERRIDE set; URLs will be derived from the inbound request host"
            );
        }

        Ok(())
    }
}

fn parse_host_override(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        ConfigError::ValidationError(format!("FILEHOST_HOST_OVERRIDE is not a valid URL: {e}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::ValidationError(format!(
            "FILEHOST_HOST_OVERRIDE must be an absolute http(s) URL, got {raw}"
        )));
    }

    Ok(url)
}

/// `true` links everything, `false` never links, a positive integer is the byte threshold.
fn parse_link_mode(raw: &str) -> Result<LinkMode, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(LinkMode::Always),
        "false" | "0" | "no" | "off" => Ok(LinkMode::Copy),
        other => other
            .parse::<u64>()
            .map(LinkMode::Threshold)
            .map_err(|_| {
                ConfigError::ValidationError(format!(
                    "FILEHOST_LINK_FILE must be a boolean or a positive integer, got {raw}"
                ))
            }),
    }
}

fn parse_link_kind(raw: &str) -> Result<LinkKind, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "hard" => Ok(LinkKind::Hard),
        "symbolic" => Ok(LinkKind::Symbolic),
        _ => Err(ConfigError::ValidationError(format!(
            "FILEHOST_LINK_TYPE must be 'hard' or 'symbolic', got {raw}"
        ))),
    }
}
