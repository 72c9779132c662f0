// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route-level auth policies.
//!
//! Attach with `axum::middleware::from_fn_with_state`:
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/api/user/profile/", get(get_profile))
//!     .route_layer(middleware::from_fn_with_state(state.clone(), require_token));
//! ```
//!
//! A rejected request never reaches the handler.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::extractor::authenticate;
use super::signature::{AUTH_DATA_HEADER, AUTH_SIGNATURE_HEADER};
use super::AuthError;
use crate::state::AppState;

/// Require a valid session token and attach the identity to the request.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &state) {
        Ok(identity) => {
            debug!(subject = %identity.subject, "Token accepted");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Attach the identity when a valid token is present; otherwise continue anonymously.
pub async fn optional_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(identity) = authenticate(request.headers(), &state) {
        request.extensions_mut().insert(identity);
    }
    next.run(request).await
}

/// Require `X-Auth-Data` signed by the configured RSA key.
pub async fn require_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match check_signature(request.headers(), &state) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

fn check_signature(headers: &HeaderMap, state: &AppState) -> Result<(), AuthError> {
    let header = |name: &str| {
        headers
            .get(name)
            .map(|value| value.to_str().unwrap_or_default())
            .filter(|value| !value.is_empty())
    };

    let (Some(data), Some(signature)) = (header(AUTH_DATA_HEADER), header(AUTH_SIGNATURE_HEADER))
    else {
        return Err(AuthError::MissingSignatureHeaders);
    };

    if !state.signatures.verify_signature(data, signature) {
        return Err(AuthError::InvalidRequestSignature);
    }
    Ok(())
}
