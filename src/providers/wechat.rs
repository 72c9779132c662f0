// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! WeChat mini-program login (`jscode2session`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

const DEFAULT_API_URL: &str = "https://api.weixin.qq.com/sns/jscode2session";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider rejected the code ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("identity provider request failed: {0}")]
    Request(String),

    #[error("identity provider response was invalid: {0}")]
    InvalidResponse(String),
}

/// Exchanges an external login code for a stable user identifier.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError>;
}

/// `jscode2session` response; WeChat sends either the session or an error.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    openid: Option<String>,
    #[serde(default)]
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: Option<String>,
}

impl SessionResponse {
    fn into_openid(self) -> Result<String, IdentityError> {
        if let Some(code) = self.errcode.filter(|code| *code != 0) {
            return Err(IdentityError::Rejected {
                code,
                message: self.errmsg.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        self.openid
            .filter(|openid| !openid.is_empty())
            .ok_or_else(|| IdentityError::InvalidResponse("missing openid".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct WeChatClient {
    api_url: String,
    appid: String,
    secret: String,
    http: Client,
}

impl WeChatClient {
    pub fn new(appid: impl Into<String>, secret: impl Into<String>) -> Result<Self, IdentityError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_url: DEFAULT_API_URL.to_string(),
            appid: appid.into(),
            secret: secret.into(),
            http,
        })
    }

    #[cfg(test)]
    fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl IdentityProvider for WeChatClient {
    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("appid", self.appid.as_str()),
                ("secret", self.secret.as_str()),
                ("js_code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.without_url().to_string()))?;

        // WeChat labels the JSON body as text/plain, so parse it from text.
        let body = response
            .text()
            .await
            .map_err(|e| IdentityError::Request(e.without_url().to_string()))?;
        let session: SessionResponse = serde_json::from_str(&body)
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        session.into_openid().inspect_err(|e| {
            warn!(error = %e, "WeChat code exchange failed");
        })
    }
}
