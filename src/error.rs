// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Response envelope and API error type.
//!
//! Every JSON response has the shape `{"code": <status>, "message": ..., "data": ...}`.
//! Errors always carry `"data": null`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::UserStoreError;

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Build an error envelope (`data: null`) with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse::<()> {
        code: status.as_u16(),
        message: message.into(),
        data: None,
    };
    (status, Json(body)).into_response()
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(self.status, self.message)
    }
}

impl From<UserStoreError> for ApiError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::NotFound(_) => Self::not_found("User not found"),
            UserStoreError::PhoneTaken => Self::conflict(err.to_string()),
            UserStoreError::FieldTooLong { .. } => Self::bad_request(err.to_string()),
            other => {
                tracing::error!(error = %other, "User database failure");
                Self::internal("User database error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let taken = ApiError::conflict("taken");
        assert_eq!(taken.status, StatusCode::CONFLICT);

        let down = ApiError::unavailable("down");
        assert_eq!(down.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn user_store_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(UserStoreError::NotFound("o1".into())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::from(UserStoreError::PhoneTaken).status, StatusCode::CONFLICT);
        let too_long = ApiError::from(UserStoreError::FieldTooLong {
            field: "name",
            max: 100,
        });
        assert_eq!(too_long.status, StatusCode::BAD_REQUEST);
        assert_eq!(too_long.message, "name must be at most 100 characters");
    }

    #[tokio::test]
    async fn error_renders_envelope_with_null_data() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"code":400,"message":"bad data","data":null}"#);
    }

    #[tokio::test]
    async fn success_envelope_uses_status_code() {
        let response =
            ApiResponse::with_status(StatusCode::SERVICE_UNAVAILABLE, "down", 1).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["code"], 503);
        assert_eq!(body["data"], 1);
    }
}
