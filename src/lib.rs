// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Community Vector Server
//!
//! Backend for a WeChat mini-program: users log in with a WeChat code, keep a
//! small profile, and search a shared pool of texts by semantic similarity.
//! Texts are embedded by Ollama and stored in Milvus.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session tokens (HS256) and RSA request signatures
//! - `providers` - WeChat, Ollama and Milvus clients
//! - `storage` - User profiles (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod providers;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;
