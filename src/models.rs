// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. Responses travel inside the
//! `{code, message, data}` envelope; the types here describe `data`.
//!
//! ## Model Categories
//!
//! - **Login**: WeChat code exchange and the issued token
//! - **Profile**: the caller's user record
//! - **Vectors**: text insertion, similarity search and CSV export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::storage::{ProfilePatch, User};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn avatar_url(media_url: &str, avatar: Option<&str>) -> Option<String> {
    avatar.map(|path| format!("{media_url}{}", path.trim_start_matches('/')))
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WxLoginRequest {
    /// Code returned by `wx.login()` in the mini-program.
    #[serde(default)]
    pub code: Option<String>,
}

/// Summary of the user returned at login.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserInfo {
    pub openid: String,
    pub nickname: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    /// Absolute avatar URL.
    pub avatar: Option<String>,
    pub is_new_user: bool,
}

impl UserInfo {
    pub fn from_user(user: &User, media_url: &str, is_new_user: bool) -> Self {
        Self {
            openid: user.openid.clone(),
            nickname: user.nickname.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
            avatar: avatar_url(media_url, user.avatar.as_deref()),
            is_new_user,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Session token for the `Authorization` header.
    pub token: String,
    pub user_info: UserInfo,
}

// =============================================================================
// Profile
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub openid: String,
    pub nickname: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Stored media path.
    pub avatar: Option<String>,
    /// Media URL prefix joined with `avatar`.
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn from_user(user: User, media_url: &str) -> Self {
        let avatar_url = avatar_url(media_url, user.avatar.as_deref());
        Self {
            id: user.id,
            openid: user.openid,
            nickname: user.nickname,
            name: user.name,
            phone: user.phone,
            address: user.address,
            avatar: user.avatar,
            avatar_url,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Partial profile update. Omitted fields are unchanged; `null` clears a field.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// At most 50 characters.
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>)]
    pub nickname: Option<Option<String>>,
    /// At most 100 characters.
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>)]
    pub name: Option<Option<String>>,
    /// At most 11 characters, unique across users.
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>)]
    pub address: Option<Option<String>>,
    /// Media path of an already uploaded image.
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>)]
    pub avatar: Option<Option<String>>,
}

impl From<UpdateProfileRequest> for ProfilePatch {
    fn from(request: UpdateProfileRequest) -> Self {
        Self {
            nickname: request.nickname,
            name: request.name,
            phone: request.phone,
            address: request.address,
            avatar: request.avatar,
        }
    }
}

// =============================================================================
// Vectors
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InsertTextRequest {
    /// Text to embed and store, at most 1000 bytes of UTF-8. Stored as sent.
    #[serde(default)]
    pub text: String,
    /// Free-form metadata, at most 500 bytes of UTF-8.
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InsertTextResponse {
    /// Id assigned by the vector database.
    pub id: i64,
    pub text: String,
    pub metadata: String,
    pub embedding_dim: usize,
}

pub const DEFAULT_SEARCH_LIMIT: i64 = 10;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SearchTextRequest {
    #[serde(default)]
    pub text: String,
    /// Number of results, 1 to 100 (default 10).
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchTextResponse {
    /// Matching texts, closest first.
    pub results: Vec<String>,
    pub total: usize,
    /// Caller's openid.
    pub openid: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VectorHealth {
    pub milvus_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_dimension: Option<usize>,
    /// Whether the embedding service answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_service: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Whether `embedding_model` is installed on the embedding service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExportResponse {
    /// Path of the written CSV file.
    pub file_path: String,
    pub total_records: usize,
}
