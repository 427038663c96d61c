// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`AppConfig`] loaded once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `5000` |
//! | `DATA_DIR` | Root for the database, audit logs and local media | `./data` |
//! | `JWT_SECRET` | HMAC secret for session tokens (at least 32 bytes) | Required |
//! | `TOKEN_TTL_HOURS` | Session token validity | `24` |
//! | `PUBLIC_BASE_URL` | Base URL for locally stored media | `http://localhost:{PORT}` |
//! | `OBJECT_STORE` | `local` or `azure` | `local` |
//! | `AZURE_STORAGE_BLOB_URL` | Blob endpoint, e.g. `https://acct.blob.core.windows.net` | Required for azure |
//! | `AZURE_CONTAINER_NAME` | Blob container | Required for azure |
//! | `AZURE_STORAGE_SAS_TOKEN` | SAS token with create/write permission | Required for azure |
//! | `MAX_UPLOAD_BYTES` | Body limit for gift uploads | `10485760` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Unset |
//! | `RECONCILE_INTERVAL_SECS` | Counter reconciliation period, `0` disables | `300` |
//! | `BOOTSTRAP_ADMIN_USERNAME` / `BOOTSTRAP_ADMIN_PASSWORD` | Admin created at startup if absent | Unset |
//! | `SEED_ENROLLMENTS_PATH` | JSON enrollment list imported at startup | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::token::MIN_SECRET_LEN;
use crate::storage::paths::DATA_ROOT;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const TOKEN_TTL_HOURS_ENV: &str = "TOKEN_TTL_HOURS";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const OBJECT_STORE_ENV: &str = "OBJECT_STORE";
pub const AZURE_BLOB_URL_ENV: &str = "AZURE_STORAGE_BLOB_URL";
pub const AZURE_CONTAINER_ENV: &str = "AZURE_CONTAINER_NAME";
pub const AZURE_SAS_TOKEN_ENV: &str = "AZURE_STORAGE_SAS_TOKEN";
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const RECONCILE_INTERVAL_ENV: &str = "RECONCILE_INTERVAL_SECS";
pub const BOOTSTRAP_ADMIN_USERNAME_ENV: &str = "BOOTSTRAP_ADMIN_USERNAME";
pub const BOOTSTRAP_ADMIN_PASSWORD_ENV: &str = "BOOTSTRAP_ADMIN_PASSWORD";
pub const SEED_ENROLLMENTS_PATH_ENV: &str = "SEED_ENROLLMENTS_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Configuration errors. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where proof images are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectStoreConfig {
    Local,
    Azure {
        blob_url: String,
        container: String,
        sas_token: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT` from the process environment; unknown values fall back to pretty.
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV).ok().as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Admin account ensured at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Fully validated runtime configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: Vec<u8>,
    pub token_ttl: chrono::Duration,
    pub public_base_url: String,
    pub object_store: ObjectStoreConfig,
    pub max_upload_bytes: usize,
    pub tls: Option<(PathBuf, PathBuf)>,
    /// `None` disables the background reconciler
    pub reconcile_interval: Option<Duration>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub seed_enrollments_path: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("token_ttl", &self.token_ttl)
            .field("public_base_url", &self.public_base_url)
            .field("object_store", &self.object_store_kind())
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("tls", &self.tls.is_some())
            .field("reconcile_interval", &self.reconcile_interval)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .field("seed_enrollments_path", &self.seed_enrollments_path)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let data_dir = PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()));

        let jwt_secret = lookup(JWT_SECRET_ENV)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?
            .into_bytes();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: JWT_SECRET_ENV,
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let ttl_hours: i64 = parse_or(get(TOKEN_TTL_HOURS_ENV), TOKEN_TTL_HOURS_ENV, DEFAULT_TOKEN_TTL_HOURS)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: TOKEN_TTL_HOURS_ENV,
                reason: "must be positive".to_string(),
            });
        }

        let public_base_url = get(PUBLIC_BASE_URL_ENV)
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&public_base_url).map_err(|e| ConfigError::Invalid {
            name: PUBLIC_BASE_URL_ENV,
            reason: e.to_string(),
        })?;

        let object_store = match get(OBJECT_STORE_ENV).as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("local") => ObjectStoreConfig::Local,
            Some("azure") => ObjectStoreConfig::Azure {
                blob_url: get(AZURE_BLOB_URL_ENV).ok_or(ConfigError::Missing(AZURE_BLOB_URL_ENV))?,
                container: get(AZURE_CONTAINER_ENV).ok_or(ConfigError::Missing(AZURE_CONTAINER_ENV))?,
                sas_token: get(AZURE_SAS_TOKEN_ENV).ok_or(ConfigError::Missing(AZURE_SAS_TOKEN_ENV))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: OBJECT_STORE_ENV,
                    reason: format!("expected 'local' or 'azure', got '{other}'"),
                })
            }
        };

        let max_upload_bytes = parse_or(get(MAX_UPLOAD_BYTES_ENV), MAX_UPLOAD_BYTES_ENV, DEFAULT_MAX_UPLOAD_BYTES)?;

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let reconcile_secs: u64 = parse_or(
            get(RECONCILE_INTERVAL_ENV),
            RECONCILE_INTERVAL_ENV,
            DEFAULT_RECONCILE_INTERVAL_SECS,
        )?;
        let reconcile_interval = (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs));

        let bootstrap_password = lookup(BOOTSTRAP_ADMIN_PASSWORD_ENV).filter(|p| !p.is_empty());
        let bootstrap_admin = match (get(BOOTSTRAP_ADMIN_USERNAME_ENV), bootstrap_password) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(BOOTSTRAP_ADMIN_PASSWORD_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(BOOTSTRAP_ADMIN_USERNAME_ENV)),
        };

        Ok(Self {
            host,
            port,
            data_dir,
            jwt_secret,
            token_ttl: chrono::Duration::hours(ttl_hours),
            public_base_url,
            object_store,
            max_upload_bytes,
            tls,
            reconcile_interval,
            bootstrap_admin,
            seed_enrollments_path: get(SEED_ENROLLMENTS_PATH_ENV).map(PathBuf::from),
        })
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn object_store_kind(&self) -> &'static str {
        match self.object_store {
            ObjectStoreConfig::Local => "local",
            ObjectStoreConfig::Azure { .. } => "azure",
        }
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
