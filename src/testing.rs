// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process stand-ins for WeChat, Ollama and Milvus, plus a ready-made
//! `AppState` for handler and middleware tests.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::auth::{SignatureVerifier, TokenAuthority};
use crate::providers::{
    EmbeddingError, EmbeddingProvider, IdentityError, IdentityProvider, ModelInfo, SearchHit,
    VectorRecord, VectorStore, VectorStoreError,
};
use crate::state::{AppState, ServiceSettings};
use crate::storage::UserRepository;

pub const TEST_SECRET: &str = "test-signing-secret";
pub const TEST_DIMENSION: usize = 8;
pub const TEST_MEDIA_URL: &str = "https://cdn.example.com/media/";
pub const TEST_SIGNER_PEM: &str = include_str!("../testdata/api_client.pem");
const TEST_PUBLIC_KEY: &str = include_str!("../testdata/api_keys.pub");

/// Login code that the fake provider rejects like WeChat does.
pub const REJECTED_CODE: &str = "expired-code";

/// Maps code `c` to openid `o_c`.
pub struct FakeIdentityProvider;

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        if code == REJECTED_CODE {
            return Err(IdentityError::Rejected {
                code: 40163,
                message: "code been used".to_string(),
            });
        }
        Ok(format!("o_{code}"))
    }
}

pub const TEST_EMBEDDING_MODEL: &str = "hash-embed";

/// Deterministic embeddings: equal texts get equal vectors.
pub struct HashEmbeddings {
    pub dimension: usize,
    pub online: AtomicBool,
    pub model_installed: AtomicBool,
}

impl HashEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            online: AtomicBool::new(true),
            model_installed: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Request("connection refused".to_string()));
        }

        // FNV-1a seed, then a small LCG.
        let mut state = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
        Ok((0..self.dimension)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                ((state >> 40) as f32 / (1u64 << 24) as f32) - 0.5
            })
            .collect())
    }

    async fn check_connection(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn model(&self) -> &str {
        TEST_EMBEDDING_MODEL
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, EmbeddingError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Request("connection refused".to_string()));
        }
        let mut models = vec![ModelInfo {
            name: "nomic-embed-text:latest".to_string(),
            size: None,
            digest: None,
        }];
        if self.model_installed.load(Ordering::SeqCst) {
            models.push(ModelInfo {
                name: format!("{TEST_EMBEDDING_MODEL}:latest"),
                size: Some(1024),
                digest: None,
            });
        }
        Ok(models)
    }
}

struct Row {
    id: i64,
    vector: Vec<f32>,
    content: String,
    metadata: String,
}

/// Exact L2 scan over an in-memory table.
pub struct MemoryVectorStore {
    dimension: usize,
    rows: Mutex<Vec<Row>>,
    next_id: AtomicI64,
    pub online: AtomicBool,
}

impl MemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            online: AtomicBool::new(true),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn check_online(&self) -> Result<(), VectorStoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VectorStoreError::Request("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn collection_name(&self) -> &str {
        "test_vectors"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ping(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        self.check_online()
    }

    async fn insert(
        &self,
        vector: &[f32],
        content: &str,
        metadata: &str,
    ) -> Result<i64, VectorStoreError> {
        self.check_online()?;
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().push(Row {
            id,
            vector: vector.to_vec(),
            content: content.to_string(),
            metadata: metadata.to_string(),
        });
        Ok(id)
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, VectorStoreError> {
        self.check_online()?;
        let rows = self.rows.lock().unwrap();
        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| SearchHit {
                id: row.id,
                distance: row
                    .vector
                    .iter()
                    .zip(vector)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum(),
                content: row.content.clone(),
                metadata: row.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn query_all(&self, limit: usize) -> Result<Vec<VectorRecord>, VectorStoreError> {
        self.check_online()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .map(|row| VectorRecord {
                id: row.id,
                content: row.content.clone(),
                metadata: row.metadata.clone(),
            })
            .collect())
    }
}

/// Handles to the fakes behind a test state.
pub struct TestHarness {
    pub state: AppState,
    pub embeddings: Arc<HashEmbeddings>,
    pub vectors: Arc<MemoryVectorStore>,
    pub dir: TempDir,
}

pub fn harness() -> TestHarness {
    let dir = tempfile::tempdir().unwrap();
    let embeddings = Arc::new(HashEmbeddings::new(TEST_DIMENSION));
    let vectors = Arc::new(MemoryVectorStore::new(TEST_DIMENSION));

    let state = AppState {
        tokens: Arc::new(TokenAuthority::with_hours(TEST_SECRET, 1).unwrap()),
        signatures: Arc::new(SignatureVerifier::from_key_material(TEST_PUBLIC_KEY).unwrap()),
        identity: Arc::new(FakeIdentityProvider),
        embeddings: embeddings.clone(),
        vectors: vectors.clone(),
        users: Arc::new(UserRepository::open(&dir.path().join("users.redb")).unwrap()),
        settings: Arc::new(ServiceSettings {
            export_dir: dir.path().join("exports"),
            media_url: TEST_MEDIA_URL.to_string(),
        }),
    };

    TestHarness {
        state,
        embeddings,
        vectors,
        dir,
    }
}

pub fn test_state() -> (AppState, TempDir) {
    let TestHarness { state, dir, .. } = harness();
    (state, dir)
}
