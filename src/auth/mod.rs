// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Two independent mechanisms protect the API.
//!
//! ## Session tokens
//!
//! 1. The mini-program logs in with a WeChat code (`/api/user/wx-login/`)
//! 2. The server issues an HS256 token whose subject is the user's openid
//! 3. Clients send `Authorization: Bearer <token>` (the bare token is accepted too)
//! 4. [`middleware::require_token`] / [`Auth`] verify signature and expiry;
//!    [`middleware::optional_token`] / [`OptionalAuth`] treat any failure as anonymous
//!
//! ## Request signatures
//!
//! Trusted back-office callers sign an arbitrary string with their RSA
//! private key and send it as `X-Auth-Data` / `X-Auth-Signature`
//! (PKCS#1 v1.5, SHA-256, base64). [`middleware::require_signature`]
//! checks it against the configured public key.
//!
//! ## Security
//!
//! - No clock leeway; the local clock decides expiry
//! - No revocation; a token stays valid until it expires
//! - `X-Auth-Data` is not checked for freshness, so a captured pair can be replayed

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod signature;
pub mod token;

pub use claims::{Identity, TokenClaims};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use signature::{RequestSigner, SignatureVerifier, SignedHeaders};
pub use token::{TokenAuthority, TokenError};
