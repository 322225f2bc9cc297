//! Server configuration loaded from environment variables.
//!
//! The admin secret and e-mail have no defaults: the server refuses to start
//! without them. Everything else falls back to a local-development default.

use std::net::SocketAddr;
use std::path::PathBuf;

use dlms_shared::constants::{DEFAULT_HTTP_PORT, MAX_IMAGE_SIZE};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set and non-empty")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Shared admin password; also the seed of the session signing key.
    /// Env: `ADMIN_SECRET` (required)
    pub admin_secret: String,

    /// The single admin account's e-mail.
    /// Env: `ADMIN_EMAIL` (required)
    pub admin_email: String,

    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./dlms.db`
    pub database_path: PathBuf,

    /// Root directory of the image buckets.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./storage`
    pub blob_storage_path: PathBuf,

    /// Prefix of the public image URLs stored on each record.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// Largest accepted photo or signature, in bytes.
    /// Env: `MAX_IMAGE_SIZE`
    /// Default: 2 MiB
    pub max_image_size: usize,

    /// Insert the sample records on startup.
    /// Env: `SEED_SAMPLE_DATA` (true/false)
    /// Default: `false`
    pub seed_sample_data: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("admin_secret", &"<redacted>")
            .field("admin_email", &self.admin_email)
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("blob_storage_path", &self.blob_storage_path)
            .field("public_base_url", &self.public_base_url)
            .field("max_image_size", &self.max_image_size)
            .field("seed_sample_data", &self.seed_sample_data)
            .finish()
    }
}

impl ServerConfig {
    /// Development defaults around the given admin credentials.
    pub fn with_credentials(admin_secret: impl Into<String>, admin_email: impl Into<String>) -> Self {
        Self {
            admin_secret: admin_secret.into(),
            admin_email: admin_email.into(),
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./dlms.db"),
            blob_storage_path: PathBuf::from("./storage"),
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            max_image_size: MAX_IMAGE_SIZE,
            seed_sample_data: false,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let mut config = Self::with_credentials(required("ADMIN_SECRET")?, required("ADMIN_EMAIL")?);

        if let Some(addr) = lookup("HTTP_ADDR") {
            config.http_addr = addr.parse().map_err(|_| ConfigError::Invalid {
                name: "HTTP_ADDR",
                value: addr.clone(),
            })?;
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }

        if let Some(url) = lookup("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = lookup("MAX_IMAGE_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_image_size = n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "MAX_IMAGE_SIZE",
                        value: val,
                    })
                }
            }
        }

        if let Some(val) = lookup("SEED_SAMPLE_DATA") {
            config.seed_sample_data = val == "true" || val == "1";
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter.

        Ok(config)
    }
}
