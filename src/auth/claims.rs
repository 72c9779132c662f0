// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the per-request resolved identity.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fixed issuer label written into every session token.
pub const TOKEN_ISSUER: &str = "community_vector_server";

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user's WeChat openid.
    ///
    /// Tokens minted by earlier deployments carry it as `openid`.
    #[serde(alias = "openid")]
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Issuer
    #[serde(default)]
    pub iss: String,
}

/// Identity resolved from a verified token.
///
/// Lives in the request extensions for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    /// Subject identifier (WeChat openid)
    pub subject: String,

    /// Token issue time (Unix timestamp)
    #[serde(skip)]
    pub issued_at: i64,

    /// Token expiry (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl Identity {
    pub fn from_claims(claims: TokenClaims) -> Self {
        Self {
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }

    /// Identity for handler tests that bypass token verification.
    #[cfg(test)]
    pub fn for_subject(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            issued_at: 0,
            expires_at: i64::MAX,
        }
    }
}
