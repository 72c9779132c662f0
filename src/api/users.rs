// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User profile endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::info;

use crate::{
    auth::Auth,
    error::{ApiError, ApiResponse},
    models::{UpdateProfileRequest, UserProfile},
    state::AppState,
};

/// Get the caller's profile.
#[utoipa::path(
    get,
    path = "/api/user/profile/",
    tag = "User",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Auth(identity): Auth,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state
        .users
        .get(&identity.subject)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::ok(
        "OK",
        UserProfile::from_user(user, &state.settings.media_url),
    ))
}

/// Update part of the caller's profile.
///
/// Omitted fields are left unchanged and `null` clears a field.
#[utoipa::path(
    put,
    path = "/api/user/profile/",
    tag = "User",
    request_body = UpdateProfileRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 400, description = "Invalid field value"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Phone number already in use")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Auth(identity): Auth,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let Json(request) = payload?;
    let user = state.users.update_profile(&identity.subject, request.into())?;

    info!(openid = %identity.subject, "Profile updated");
    Ok(ApiResponse::ok(
        "Profile updated",
        UserProfile::from_user(user, &state.settings.media_url),
    ))
}
