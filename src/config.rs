// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup. The process
//! refuses to start when a required value is missing.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WX_APPID` | WeChat mini-program AppID | Required |
//! | `WX_SECRET` | WeChat mini-program secret | Required |
//! | `JWT_SECRET_KEY` | HS256 secret for session tokens | Required |
//! | `JWT_EXPIRE_HOURS` | Token validity window in hours | `168` |
//! | `AUTH_PUBLIC_KEY` | Inline public key for signed requests | Optional |
//! | `AUTH_PUBLIC_KEY_PATH` | Public key file for signed requests | `api_keys.pub` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory of the embedded user database | `./data` |
//! | `EXPORT_DIR` | Directory CSV exports are written to | `file` |
//! | `MEDIA_URL` | URL prefix for stored avatar paths | `/media/` |
//! | `OLLAMA_BASE_URL` | Embedding service base URL | `http://localhost:11434` |
//! | `OLLAMA_EMBED_MODEL` | Embedding model name | `chroma/all-minilm-l6-v2-f32` |
//! | `MILVUS_URL` | Milvus REST endpoint | `http://localhost:19530` |
//! | `MILVUS_TOKEN` | Milvus bearer token | Optional |
//! | `MILVUS_COLLECTION_NAME` | Vector collection name | `community_vectors` |
//! | `VECTOR_DIMENSION` | Embedding dimension | `384` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files enabling HTTPS | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;

pub const WX_APPID_ENV: &str = "WX_APPID";
pub const WX_SECRET_ENV: &str = "WX_SECRET";
pub const JWT_SECRET_KEY_ENV: &str = "JWT_SECRET_KEY";
pub const JWT_EXPIRE_HOURS_ENV: &str = "JWT_EXPIRE_HOURS";
pub const AUTH_PUBLIC_KEY_ENV: &str = "AUTH_PUBLIC_KEY";
pub const AUTH_PUBLIC_KEY_PATH_ENV: &str = "AUTH_PUBLIC_KEY_PATH";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const EXPORT_DIR_ENV: &str = "EXPORT_DIR";
pub const MEDIA_URL_ENV: &str = "MEDIA_URL";
pub const OLLAMA_BASE_URL_ENV: &str = "OLLAMA_BASE_URL";
pub const OLLAMA_EMBED_MODEL_ENV: &str = "OLLAMA_EMBED_MODEL";
pub const MILVUS_URL_ENV: &str = "MILVUS_URL";
pub const MILVUS_TOKEN_ENV: &str = "MILVUS_TOKEN";
pub const MILVUS_COLLECTION_ENV: &str = "MILVUS_COLLECTION_NAME";
pub const VECTOR_DIMENSION_ENV: &str = "VECTOR_DIMENSION";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default token validity window (7 days).
pub const DEFAULT_JWT_EXPIRE_HOURS: u64 = 168;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_VECTOR_DIMENSION: usize = 384;
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_EMBED_MODEL: &str = "chroma/all-minilm-l6-v2-f32";
pub const DEFAULT_MILVUS_URL: &str = "http://localhost:19530";
pub const DEFAULT_MILVUS_COLLECTION: &str = "community_vectors";

/// Values starting with this prefix are template placeholders, not settings.
const PLACEHOLDER_PREFIX: &str = "your_";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where the request-signature public key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeySource {
    Inline(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Typed, validated process configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub wx_appid: String,
    pub wx_secret: String,
    pub jwt_secret: String,
    pub jwt_expire_hours: u64,
    pub public_key: PublicKeySource,
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    pub media_url: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub milvus_url: String,
    pub milvus_token: Option<String>,
    pub milvus_collection: String,
    pub vector_dimension: usize,
    pub tls: Option<TlsPaths>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && !v.starts_with(PLACEHOLDER_PREFIX))
        };

        let mut missing = Vec::new();
        let mut required = |name: &'static str| {
            get(name).unwrap_or_else(|| {
                missing.push(name);
                String::new()
            })
        };
        let wx_appid = required(WX_APPID_ENV);
        let wx_secret = required(WX_SECRET_ENV);
        let jwt_secret = required(JWT_SECRET_KEY_ENV);
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        // A zero window would issue tokens that are already expired.
        let jwt_expire_hours = match get(JWT_EXPIRE_HOURS_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(hours) if hours > 0 => hours,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: JWT_EXPIRE_HOURS_ENV,
                        reason: format!("expected a positive whole number of hours, got {raw:?}"),
                    })
                }
            },
            None => DEFAULT_JWT_EXPIRE_HOURS,
        };

        let public_key = match get(AUTH_PUBLIC_KEY_ENV) {
            Some(inline) => PublicKeySource::Inline(inline),
            None => PublicKeySource::File(PathBuf::from(
                get(AUTH_PUBLIC_KEY_PATH_ENV).unwrap_or_else(|| "api_keys.pub".to_string()),
            )),
        };

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let vector_dimension = match get(VECTOR_DIMENSION_ENV) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(dim) if dim > 0 => dim,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: VECTOR_DIMENSION_ENV,
                        reason: format!("expected a positive integer, got {raw:?}"),
                    })
                }
            },
            None => DEFAULT_VECTOR_DIMENSION,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(vec![TLS_KEY_PATH_ENV])),
            (None, Some(_)) => return Err(ConfigError::Missing(vec![TLS_CERT_PATH_ENV])),
        };

        let mut media_url = get(MEDIA_URL_ENV).unwrap_or_else(|| "/media/".to_string());
        if !media_url.ends_with('/') {
            media_url.push('/');
        }

        Ok(Self {
            wx_appid,
            wx_secret,
            jwt_secret,
            jwt_expire_hours,
            public_key,
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            data_dir: get(DATA_DIR_ENV).unwrap_or_else(|| "./data".to_string()).into(),
            export_dir: get(EXPORT_DIR_ENV).unwrap_or_else(|| "file".to_string()).into(),
            media_url,
            ollama_base_url: get(OLLAMA_BASE_URL_ENV)
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
            ollama_model: get(OLLAMA_EMBED_MODEL_ENV)
                .unwrap_or_else(|| DEFAULT_OLLAMA_EMBED_MODEL.to_string()),
            milvus_url: get(MILVUS_URL_ENV).unwrap_or_else(|| DEFAULT_MILVUS_URL.to_string()),
            milvus_token: get(MILVUS_TOKEN_ENV),
            milvus_collection: get(MILVUS_COLLECTION_ENV)
                .unwrap_or_else(|| DEFAULT_MILVUS_COLLECTION.to_string()),
            vector_dimension,
            tls,
        })
    }

    /// Path of the embedded user database.
    pub fn user_db_path(&self) -> PathBuf {
        self.data_dir.join("users.redb")
    }

    /// Bind address as `host:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shows the first ten characters of the AppID and masks every secret.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let appid = if self.wx_appid.chars().count() > 10 {
            format!("{}...", self.wx_appid.chars().take(10).collect::<String>())
        } else {
            self.wx_appid.clone()
        };
        f.debug_struct("AppConfig")
            .field("wx_appid", &appid)
            .field("wx_secret", &"***")
            .field("jwt_secret", &"***")
            .field("jwt_expire_hours", &self.jwt_expire_hours)
            .field("public_key", &self.public_key_label())
            .field("bind", &self.bind_address())
            .field("data_dir", &self.data_dir)
            .field("export_dir", &self.export_dir)
            .field("media_url", &self.media_url)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("ollama_model", &self.ollama_model)
            .field("milvus_url", &self.milvus_url)
            .field("milvus_token", &self.milvus_token.as_ref().map(|_| "***"))
            .field("milvus_collection", &self.milvus_collection)
            .field("vector_dimension", &self.vector_dimension)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl AppConfig {
    fn public_key_label(&self) -> String {
        match &self.public_key {
            PublicKeySource::Inline(_) => "inline".to_string(),
            PublicKeySource::File(path) => path.display().to_string(),
        }
    }
}
