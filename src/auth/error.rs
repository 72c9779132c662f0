// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::token::TokenError;
use crate::error::error_response;

/// Per-request authentication failure.
///
/// Every variant rejects the request with 401. None of the messages carry
/// key material or the signing secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Authorization header is not valid visible ASCII
    InvalidAuthHeader,
    /// Authorization header carries an empty token
    EmptyToken,
    /// Token has expired
    TokenExpired,
    /// Token signature, encoding or algorithm is invalid
    InvalidToken,
    /// `X-Auth-Data` or `X-Auth-Signature` is absent
    MissingSignatureHeaders,
    /// Request signature did not verify
    InvalidRequestSignature,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::EmptyToken => "empty_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidToken => "invalid_token",
            AuthError::MissingSignatureHeaders => "missing_signature_headers",
            AuthError::InvalidRequestSignature => "invalid_request_signature",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => write!(f, "Authorization header is not valid text"),
            AuthError::EmptyToken => write!(f, "Token is empty"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::InvalidToken => write!(f, "Token is invalid"),
            AuthError::MissingSignatureHeaders => {
                write!(f, "X-Auth-Data and X-Auth-Signature headers are required")
            }
            AuthError::InvalidRequestSignature => write!(f, "Signature verification failed"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::debug!(error_code = self.error_code(), "Request rejected by auth");
        error_response(
            self.status_code(),
            format!("Authentication failed: {self}"),
        )
    }
}
