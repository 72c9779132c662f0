// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token issuance and verification (HS256 JWT).
//!
//! Tokens are self-contained: any instance holding the same secret can
//! verify a token minted by any other instance. There is no revocation; a
//! token stays valid until it expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::{Identity, TokenClaims, TOKEN_ISSUER};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing secret is not configured")]
    MissingSecret,

    #[error("token issuance failed: {0}")]
    Issuance(String),

    #[error("token has expired")]
    Expired,

    #[error("token is invalid: {0}")]
    Invalid(String),
}

/// Issues and verifies session tokens with a single shared secret.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
}

impl TokenAuthority {
    /// Build an authority from the shared secret and validity window.
    pub fn new(secret: &str, validity: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validity,
        })
    }

    /// Build an authority whose tokens live for `hours`.
    pub fn with_hours(secret: &str, hours: u64) -> Result<Self, TokenError> {
        let validity = i64::try_from(hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                TokenError::Issuance(format!("validity window of {hours} hours is too large"))
            })?;
        Self::new(secret, validity)
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issue a token for `subject`, valid from now.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a token for `subject` as if the current time were `now`.
    pub fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::Issuance("subject must not be empty".to_string()));
        }

        let issued_at = now.timestamp();
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: issued_at,
            exp: issued_at + self.validity.num_seconds(),
            iss: TOKEN_ISSUER.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Issuance(e.to_string()))
    }

    /// Verify signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify as if the current time were `now`.
    ///
    /// Signature integrity is checked first; a forged token is reported as
    /// invalid even when it is also past its expiry.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Verify and return only the subject.
    pub fn subject_of(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token).map(|claims| claims.sub)
    }

    /// Verify and return the resolved identity.
    pub fn resolve(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify(token).map(Identity::from_claims)
    }
}
