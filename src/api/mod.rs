// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::middleware::{optional_token, require_signature, require_token},
    models::{
        ExportResponse, InsertTextRequest, InsertTextResponse, LoginResponse, SearchTextRequest,
        SearchTextResponse, UpdateProfileRequest, UserInfo, UserProfile, VectorHealth,
        WxLoginRequest,
    },
    state::AppState,
};

pub mod database;
pub mod export;
pub mod health;
pub mod login;
pub mod users;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/user/wx-login/", post(login::wx_login))
        .route("/api/database/health/", get(database::health))
        .route("/health/live", get(health::liveness));

    let token_required = Router::new()
        .route(
            "/api/user/profile/",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/api/database/search-text/", post(database::search_text))
        .route_layer(from_fn_with_state(state.clone(), require_token));

    let token_optional = Router::new()
        .route("/api/database/export-csv/", get(export::export_csv))
        .route_layer(from_fn_with_state(state.clone(), optional_token));

    let signature_required = Router::new()
        .route("/api/database/insert-text/", post(database::insert_text))
        .route_layer(from_fn_with_state(state.clone(), require_signature));

    Router::new()
        .merge(public)
        .merge(token_required)
        .merge(token_optional)
        .merge(signature_required)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        login::wx_login,
        users::get_profile,
        users::update_profile,
        database::health,
        database::insert_text,
        database::search_text,
        export::export_csv,
        health::liveness
    ),
    components(
        schemas(
            WxLoginRequest,
            LoginResponse,
            UserInfo,
            UserProfile,
            UpdateProfileRequest,
            InsertTextRequest,
            InsertTextResponse,
            SearchTextRequest,
            SearchTextResponse,
            VectorHealth,
            ExportResponse,
            health::HealthResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "User", description = "WeChat login and user profiles"),
        (name = "Database", description = "Text embedding storage and search"),
        (name = "Health", description = "Liveness probe")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signature::{AUTH_DATA_HEADER, AUTH_SIGNATURE_HEADER};
    use crate::auth::RequestSigner;
    use crate::testing::{harness, TEST_SIGNER_PEM};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn login_profile_search_flow() {
        let h = harness();
        let app = router(h.state.clone());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/user/wx-login/",
            &[],
            Some(json!({"code": "c1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["user_info"]["is_new_user"], true);
        let token = body["data"]["token"].as_str().unwrap().to_string();
        let bearer = format!("Bearer {token}");

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/user/profile/",
            &[("authorization", bearer.as_str())],
            Some(json!({"nickname": "Neighbour"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["nickname"], "Neighbour");

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/user/profile/",
            &[("authorization", token.as_str())],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["openid"], "o_c1");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/database/search-text/",
            &[("authorization", bearer.as_str())],
            Some(json!({"text": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["openid"], "o_c1");
        assert_eq!(body["data"]["total"], 0);
    }

    #[tokio::test]
    async fn protected_routes_reject_missing_token() {
        let h = harness();
        let app = router(h.state.clone());

        for (method, uri) in [
            (Method::GET, "/api/user/profile/"),
            (Method::PUT, "/api/user/profile/"),
            (Method::POST, "/api/database/search-text/"),
        ] {
            let (status, body) = call(&app, method, uri, &[], Some(json!({}))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["code"], 401);
            assert!(body["data"].is_null());
        }
    }

    #[tokio::test]
    async fn insert_requires_signature() {
        let h = harness();
        let app = router(h.state.clone());
        let signed = RequestSigner::from_pem(TEST_SIGNER_PEM)
            .unwrap()
            .sign("1700000000")
            .unwrap();

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/database/insert-text/",
            &[],
            Some(json!({"text": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.vectors.len(), 0);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/database/insert-text/",
            &signed.pairs(),
            Some(json!({"text": "hello", "metadata": "greeting"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["metadata"], "greeting");
        assert_eq!(h.vectors.len(), 1);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/database/insert-text/",
            &[
                (AUTH_DATA_HEADER, "1700000001"),
                (AUTH_SIGNATURE_HEADER, signed.signature.as_str()),
            ],
            Some(json!({"text": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.vectors.len(), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request_envelope() {
        let h = harness();
        let app = router(h.state.clone());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/user/wx-login/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], 400);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn export_works_with_and_without_token() {
        let h = harness();
        let app = router(h.state.clone());

        let (status, body) = call(&app, Method::GET, "/api/database/export-csv/", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_records"], 0);

        let (status, _) = call(
            &app,
            Method::GET,
            "/api/database/export-csv/",
            &[("authorization", "Bearer not-valid")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_routes_and_request_id() {
        let h = harness();
        let app = router(h.state.clone());

        let (status, body) = call(&app, Method::GET, "/health/live", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = call(&app, Method::GET, "/api/database/health/", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["vector_dimension"], 8);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/user/wx-login/",
            "/api/user/profile/",
            "/api/database/health/",
            "/api/database/insert-text/",
            "/api/database/search-text/",
            "/api/database/export-csv/",
            "/health/live",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
