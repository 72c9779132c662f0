// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::auth::signature::{KeyError, SignatureVerifier};
use crate::auth::token::{TokenAuthority, TokenError};
use crate::config::{AppConfig, PublicKeySource};
use crate::providers::{
    EmbeddingError, EmbeddingProvider, IdentityError, IdentityProvider, MilvusClient,
    OllamaClient, VectorStore, VectorStoreError, WeChatClient,
};
use crate::storage::{UserRepository, UserStoreError};

/// Settings handlers read directly.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub export_dir: PathBuf,
    /// Prefix for avatar paths; always ends with `/`.
    pub media_url: String,
}

/// Failure while building the application state. All of these are fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("token authority: {0}")]
    Token(#[from] TokenError),

    #[error("request signature key: {0}")]
    Key(#[from] KeyError),

    #[error("identity provider: {0}")]
    Identity(#[from] IdentityError),

    #[error("embedding provider: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("user database: {0}")]
    UserStore(#[from] UserStoreError),
}

/// Shared, immutable per-process state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenAuthority>,
    pub signatures: Arc<SignatureVerifier>,
    pub identity: Arc<dyn IdentityProvider>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub vectors: Arc<dyn VectorStore>,
    pub users: Arc<UserRepository>,
    pub settings: Arc<ServiceSettings>,
}

impl AppState {
    /// Build every collaborator from configuration.
    ///
    /// Key material is loaded here, once; a missing or malformed key stops
    /// the process before it starts serving.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let tokens = TokenAuthority::with_hours(&config.jwt_secret, config.jwt_expire_hours)?;
        info!(
            validity_hours = tokens.validity().num_hours(),
            "Token authority ready"
        );

        let signatures = match &config.public_key {
            PublicKeySource::Inline(text) => SignatureVerifier::from_key_material(text)?,
            PublicKeySource::File(path) => SignatureVerifier::from_file(path)?,
        };
        info!(key_bits = signatures.key_bits(), "Request signature key loaded");

        let identity = WeChatClient::new(&config.wx_appid, &config.wx_secret)?;
        let embeddings = OllamaClient::new(&config.ollama_base_url, &config.ollama_model)?;
        let vectors = MilvusClient::new(
            &config.milvus_url,
            config.milvus_token.clone(),
            &config.milvus_collection,
            config.vector_dimension,
        )?;

        let user_db = config.user_db_path();
        let users = UserRepository::open(&user_db)?;
        info!(
            path = %user_db.display(),
            users = users.count()?,
            "User database opened"
        );

        Ok(Self {
            tokens: Arc::new(tokens),
            signatures: Arc::new(signatures),
            identity: Arc::new(identity),
            embeddings: Arc::new(embeddings),
            vectors: Arc::new(vectors),
            users: Arc::new(users),
            settings: Arc::new(ServiceSettings {
                export_dir: config.export_dir.clone(),
                media_url: config.media_url.clone(),
            }),
        })
    }
}
