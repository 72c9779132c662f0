// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Clients for the external services the API depends on.
//!
//! Each client sits behind a trait so handlers can be tested against
//! in-process fakes.

pub mod milvus;
pub mod ollama;
pub mod wechat;

pub use milvus::{MilvusClient, SearchHit, VectorRecord, VectorStore, VectorStoreError};
pub use ollama::{EmbeddingError, EmbeddingProvider, ModelInfo, OllamaClient};
pub use wechat::{IdentityError, IdentityProvider, WeChatClient};
