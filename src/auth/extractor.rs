// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the resolved identity.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity.subject is the caller's openid
//! }
//! ```
//!
//! Both extractors reuse an identity already placed in the request
//! extensions by [`super::middleware`], and otherwise verify the
//! `Authorization` header themselves.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{AuthError, Identity};
use crate::state::AppState;

/// Pull the token out of `Authorization`.
///
/// Accepts `Bearer <token>` or the bare token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?
        .trim();

    let token = match value.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(' ') => rest.trim(),
        _ => value,
    };

    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    Ok(token)
}

/// Resolve the caller from the request headers.
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Identity, AuthError> {
    let token = extract_bearer_token(headers)?;
    Ok(state.tokens.resolve(token)?)
}

/// Extractor that requires a valid session token.
pub struct Auth(pub Identity);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>().cloned() {
            return Ok(Auth(identity));
        }

        authenticate(&parts.headers, state).map(Auth)
    }
}

/// Optional authentication extractor.
///
/// Any failure resolves to `None`; the handler always runs.
pub struct OptionalAuth(pub Option<Identity>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(identity)) => Ok(OptionalAuth(Some(identity))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;
    use axum::http::{HeaderValue, Request};

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_prefix_is_optional() {
        let parts = parts_with(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&parts.headers).unwrap(), "abc.def.ghi");

        let parts = parts_with(Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token(&parts.headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn empty_or_missing_tokens_are_rejected() {
        let parts = parts_with(None);
        assert_eq!(
            extract_bearer_token(&parts.headers),
            Err(AuthError::MissingAuthHeader)
        );

        for value in ["", "Bearer", "Bearer   "] {
            let parts = parts_with(Some(value));
            assert_eq!(
                extract_bearer_token(&parts.headers),
                Err(AuthError::EmptyToken),
                "{value:?}"
            );
        }
    }

    #[test]
    fn non_text_header_is_invalid() {
        let mut parts = parts_with(None);
        parts
            .headers
            .insert(AUTHORIZATION, HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap());
        assert_eq!(
            extract_bearer_token(&parts.headers),
            Err(AuthError::InvalidAuthHeader)
        );
    }

    #[tokio::test]
    async fn auth_extractor_verifies_token() {
        let (state, _dir) = test_state();
        let token = state.tokens.issue("u123").unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));

        let Auth(identity) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(identity.subject, "u123");
    }

    #[tokio::test]
    async fn auth_extractor_rejects_bad_token() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(Some("Bearer not-a-token"));
        assert!(matches!(
            Auth::from_request_parts(&mut parts, &state).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(None);
        parts.extensions.insert(Identity::for_subject("from_middleware"));

        let Auth(identity) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(identity.subject, "from_middleware");
    }

    #[tokio::test]
    async fn optional_auth_swallows_failures() {
        let (state, _dir) = test_state();

        let mut parts = parts_with(None);
        let OptionalAuth(identity) = OptionalAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(identity.is_none());

        let mut parts = parts_with(Some("Bearer garbage"));
        let OptionalAuth(identity) = OptionalAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(identity.is_none());

        let token = state.tokens.issue("u123").unwrap();
        let mut parts = parts_with(Some(&token));
        let OptionalAuth(identity) = OptionalAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(identity.unwrap().subject, "u123");
    }
}
