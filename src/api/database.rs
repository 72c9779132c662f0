// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vector database endpoints: health, text insertion and similarity search.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info, warn};

use crate::{
    auth::Auth,
    error::{ApiError, ApiResponse},
    models::{
        InsertTextRequest, InsertTextResponse, SearchTextRequest, SearchTextResponse,
        VectorHealth, DEFAULT_SEARCH_LIMIT,
    },
    providers::milvus::{CONTENT_MAX_LENGTH, METADATA_MAX_LENGTH},
    state::AppState,
};

const SEARCH_LIMIT_MAX: i64 = 100;

/// Embed `text` and check the vector fits the collection.
async fn embed(state: &AppState, text: &str) -> Result<Vec<f32>, ApiError> {
    let embedding = state.embeddings.embed(text).await.map_err(|e| {
        error!(error = %e, "Embedding request failed");
        ApiError::internal("Failed to generate embedding")
    })?;

    let expected = state.vectors.dimension();
    if embedding.len() != expected {
        error!(expected, actual = embedding.len(), "Embedding dimension mismatch");
        return Err(ApiError::internal(format!(
            "Embedding dimension mismatch: expected {expected}, got {}",
            embedding.len()
        )));
    }
    Ok(embedding)
}

#[utoipa::path(
    get,
    path = "/api/database/health/",
    tag = "Database",
    responses(
        (status = 200, description = "Vector database reachable", body = VectorHealth),
        (status = 503, description = "Vector database unreachable", body = VectorHealth)
    )
)]
pub async fn health(State(state): State<AppState>) -> ApiResponse<VectorHealth> {
    if !state.vectors.ping().await {
        warn!("Vector database health check failed");
        return ApiResponse::with_status(
            StatusCode::SERVICE_UNAVAILABLE,
            "Vector database connection failed",
            VectorHealth {
                milvus_connected: false,
                collection_name: None,
                vector_dimension: None,
                embedding_service: None,
                embedding_model: None,
                embedding_model_available: None,
            },
        );
    }

    let model = state.embeddings.model();
    let model_available = match state.embeddings.list_models().await {
        Ok(models) => Some(models.iter().any(|m| m.matches(model))),
        Err(e) => {
            warn!(error = %e, "Embedding service health check failed");
            None
        }
    };
    if model_available == Some(false) {
        warn!(model, "Embedding model is not installed");
    }

    ApiResponse::ok(
        "Service is healthy",
        VectorHealth {
            milvus_connected: true,
            collection_name: Some(state.vectors.collection_name().to_string()),
            vector_dimension: Some(state.vectors.dimension()),
            embedding_service: Some(model_available.is_some()),
            embedding_model: Some(model.to_string()),
            embedding_model_available: model_available,
        },
    )
}

/// Embed a text and store it. Requires a request signature.
#[utoipa::path(
    post,
    path = "/api/database/insert-text/",
    tag = "Database",
    request_body = InsertTextRequest,
    params(
        ("X-Auth-Data" = String, Header, description = "Data covered by the signature"),
        ("X-Auth-Signature" = String, Header, description = "Base64 RSA-SHA256 signature of X-Auth-Data")
    ),
    responses(
        (status = 200, description = "Text stored", body = InsertTextResponse),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Missing or invalid request signature"),
        (status = 500, description = "Embedding or storage failure")
    )
)]
pub async fn insert_text(
    State(state): State<AppState>,
    payload: Result<Json<InsertTextRequest>, JsonRejection>,
) -> Result<ApiResponse<InsertTextResponse>, ApiError> {
    let Json(request) = payload?;

    let text = request.text;
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }
    // Milvus VarChar limits are in bytes.
    if text.len() > CONTENT_MAX_LENGTH {
        return Err(ApiError::bad_request(format!(
            "text must be at most {CONTENT_MAX_LENGTH} bytes of UTF-8"
        )));
    }
    let metadata = request.metadata.unwrap_or_default();
    if metadata.len() > METADATA_MAX_LENGTH {
        return Err(ApiError::bad_request(format!(
            "metadata must be at most {METADATA_MAX_LENGTH} bytes of UTF-8"
        )));
    }

    let embedding = embed(&state, &text).await?;
    let id = state
        .vectors
        .insert(&embedding, &text, &metadata)
        .await
        .map_err(|e| {
            error!(error = %e, "Vector insert failed");
            ApiError::internal("Failed to store text")
        })?;

    info!(id, bytes = text.len(), "Text inserted");
    Ok(ApiResponse::ok(
        "Inserted",
        InsertTextResponse {
            id,
            text,
            metadata,
            embedding_dim: embedding.len(),
        },
    ))
}

/// Find the stored texts closest to the query.
#[utoipa::path(
    post,
    path = "/api/database/search-text/",
    tag = "Database",
    request_body = SearchTextRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Closest texts", body = SearchTextResponse),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 500, description = "Embedding or search failure")
    )
)]
pub async fn search_text(
    State(state): State<AppState>,
    Auth(identity): Auth,
    payload: Result<Json<SearchTextRequest>, JsonRejection>,
) -> Result<ApiResponse<SearchTextResponse>, ApiError> {
    let Json(request) = payload?;

    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }
    let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    if !(1..=SEARCH_LIMIT_MAX).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {SEARCH_LIMIT_MAX}"
        )));
    }

    let embedding = embed(&state, text).await?;
    let hits = state
        .vectors
        .search(&embedding, limit as usize)
        .await
        .map_err(|e| {
            error!(error = %e, "Vector search failed");
            ApiError::internal("Search failed")
        })?;

    let results: Vec<String> = hits.into_iter().map(|hit| hit.content).collect();
    info!(subject = %identity.subject, limit, total = results.len(), "Search completed");
    Ok(ApiResponse::ok(
        "Search completed",
        SearchTextResponse {
            total: results.len(),
            results,
            openid: identity.subject,
        },
    ))
}
