// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! WeChat mini-program login.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::{error, info, warn};

use crate::{
    error::{ApiError, ApiResponse},
    models::{LoginResponse, UserInfo, WxLoginRequest},
    state::AppState,
};

/// Exchange a `wx.login()` code for a session token.
///
/// The user record is created on first login.
#[utoipa::path(
    post,
    path = "/api/user/wx-login/",
    tag = "User",
    request_body = WxLoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Missing code or rejected by WeChat"),
        (status = 500, description = "Token issuance or storage failure")
    )
)]
pub async fn wx_login(
    State(state): State<AppState>,
    payload: Result<Json<WxLoginRequest>, JsonRejection>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    let Json(request) = payload?;
    let code = request
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::bad_request("code is required"))?;

    let openid = state.identity.exchange_code(code).await.map_err(|e| {
        warn!(error = %e, "WeChat login rejected");
        ApiError::bad_request(format!("WeChat login failed: {e}"))
    })?;

    let (user, is_new_user) = state.users.get_or_create(&openid)?;

    let token = state.tokens.issue(&user.openid).map_err(|e| {
        error!(error = %e, "Token issuance failed");
        ApiError::internal("Failed to issue token")
    })?;

    info!(openid = %user.openid, is_new_user, "User logged in");
    Ok(ApiResponse::ok(
        "Login successful",
        LoginResponse {
            token,
            user_info: UserInfo::from_user(&user, &state.settings.media_url, is_new_user),
        },
    ))
}
