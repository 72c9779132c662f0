// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vector storage backed by Milvus, spoken over its REST v2 API.
//!
//! The collection holds one row per inserted text:
//!
//! | field      | type                   |
//! |------------|------------------------|
//! | `id`       | Int64, primary, auto   |
//! | `vector`   | FloatVector(dimension) |
//! | `content`  | VarChar(1000)          |
//! | `metadata` | VarChar(500)           |
//!
//! and is indexed with IVF_FLAT / L2. The collection is created and loaded
//! lazily on first use, once per process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Byte limits of the VarChar columns.
pub const CONTENT_MAX_LENGTH: usize = 1000;
pub const METADATA_MAX_LENGTH: usize = 500;
/// Upper bound for a single `query_all`.
pub const QUERY_LIMIT_MAX: usize = 10_000;

const INDEX_NLIST: u32 = 128;
const SEARCH_NPROBE: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("vector store request failed: {0}")]
    Request(String),

    #[error("vector store returned error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("vector store response was invalid: {0}")]
    InvalidResponse(String),

    #[error("vector has dimension {actual}, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub distance: f32,
    pub content: String,
    pub metadata: String,
}

/// A stored row, without its vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VectorRecord {
    pub id: i64,
    pub content: String,
    pub metadata: String,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn collection_name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Whether the store answers at all.
    async fn ping(&self) -> bool;

    /// Create and load the collection if needed.
    async fn ensure_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert one row and return its assigned id.
    async fn insert(
        &self,
        vector: &[f32],
        content: &str,
        metadata: &str,
    ) -> Result<i64, VectorStoreError>;

    /// Nearest neighbours by L2 distance, closest first.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, VectorStoreError>;

    /// Every stored row, up to `limit` (capped at [`QUERY_LIMIT_MAX`]).
    async fn query_all(&self, limit: usize) -> Result<Vec<VectorRecord>, VectorStoreError>;
}

/// Milvus REST v2 response envelope.
#[derive(Debug, Deserialize)]
struct MilvusResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

impl MilvusResponse {
    fn into_data(self) -> Result<Value, VectorStoreError> {
        if self.code != 0 {
            return Err(VectorStoreError::Api {
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        Ok(self.data)
    }
}

pub struct MilvusClient {
    base_url: String,
    token: Option<String>,
    collection: String,
    dimension: usize,
    http: Client,
    ready: OnceCell<()>,
}

impl MilvusClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        collection: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, VectorStoreError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VectorStoreError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            collection: collection.into(),
            dimension,
            http,
            ready: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/vectordb/{path}", self.base_url)
    }

    async fn call(&self, path: &str, body: &Value) -> Result<Value, VectorStoreError> {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VectorStoreError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VectorStoreError::Request(format!(
                "{path} returned HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json::<MilvusResponse>()
            .await
            .map_err(|e| VectorStoreError::InvalidResponse(e.to_string()))?
            .into_data()
    }

    async fn has_collection(&self) -> Result<bool, VectorStoreError> {
        let data = self
            .call("collections/has", &json!({ "collectionName": self.collection }))
            .await?;
        Ok(data.get("has").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn bootstrap(&self) -> Result<(), VectorStoreError> {
        if !self.has_collection().await? {
            info!(collection = %self.collection, dimension = self.dimension, "Creating vector collection");
            self.call("collections/create", &create_collection_body(&self.collection, self.dimension))
                .await?;
        }
        self.call("collections/load", &json!({ "collectionName": self.collection }))
            .await?;
        debug!(collection = %self.collection, "Vector collection loaded");
        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorStoreError> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MilvusClient {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ping(&self) -> bool {
        let mut request = self
            .http
            .post(self.url("collections/list"))
            .timeout(PING_TIMEOUT)
            .json(&json!({}));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => response
                .json::<MilvusResponse>()
                .await
                .map(|r| r.code == 0)
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        self.ready.get_or_try_init(|| self.bootstrap()).await?;
        Ok(())
    }

    async fn insert(
        &self,
        vector: &[f32],
        content: &str,
        metadata: &str,
    ) -> Result<i64, VectorStoreError> {
        self.check_dimension(vector)?;
        self.ensure_collection().await?;

        let data = self
            .call(
                "entities/insert",
                &json!({
                    "collectionName": self.collection,
                    "data": [{ "vector": vector, "content": content, "metadata": metadata }],
                }),
            )
            .await?;

        data.get("insertIds")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(parse_id)
            .ok_or_else(|| VectorStoreError::InvalidResponse("missing insertIds".to_string()))
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, VectorStoreError> {
        self.check_dimension(vector)?;
        self.ensure_collection().await?;

        let data = self
            .call(
                "entities/search",
                &json!({
                    "collectionName": self.collection,
                    "data": [vector],
                    "annsField": "vector",
                    "limit": limit,
                    "outputFields": ["content", "metadata"],
                    "searchParams": {
                        "metricType": "L2",
                        "params": { "nprobe": SEARCH_NPROBE },
                    },
                }),
            )
            .await?;

        rows(data)?.iter().map(parse_hit).collect()
    }

    async fn query_all(&self, limit: usize) -> Result<Vec<VectorRecord>, VectorStoreError> {
        self.ensure_collection().await?;

        let data = self
            .call(
                "entities/query",
                &json!({
                    "collectionName": self.collection,
                    "filter": "",
                    "limit": limit.min(QUERY_LIMIT_MAX),
                    "outputFields": ["id", "content", "metadata"],
                }),
            )
            .await?;

        rows(data)?.iter().map(parse_record).collect()
    }
}

fn create_collection_body(collection: &str, dimension: usize) -> Value {
    json!({
        "collectionName": collection,
        "schema": {
            "autoId": true,
            "enableDynamicField": false,
            "fields": [
                { "fieldName": "id", "dataType": "Int64", "isPrimary": true },
                {
                    "fieldName": "vector",
                    "dataType": "FloatVector",
                    "elementTypeParams": { "dim": dimension.to_string() },
                },
                {
                    "fieldName": "content",
                    "dataType": "VarChar",
                    "elementTypeParams": { "max_length": CONTENT_MAX_LENGTH.to_string() },
                },
                {
                    "fieldName": "metadata",
                    "dataType": "VarChar",
                    "elementTypeParams": { "max_length": METADATA_MAX_LENGTH.to_string() },
                },
            ],
        },
        "indexParams": [{
            "fieldName": "vector",
            "indexName": "vector_index",
            "metricType": "L2",
            "params": { "index_type": "IVF_FLAT", "nlist": INDEX_NLIST },
        }],
    })
}

fn rows(data: Value) -> Result<Vec<Value>, VectorStoreError> {
    match data {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        other => Err(VectorStoreError::InvalidResponse(format!(
            "expected a list of rows, got {other}"
        ))),
    }
}

/// Int64 primary keys may come back as JSON numbers or as strings.
fn parse_id(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn text_field(row: &Value, field: &str) -> String {
    row.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn row_id(row: &Value) -> Result<i64, VectorStoreError> {
    row.get("id")
        .and_then(parse_id)
        .ok_or_else(|| VectorStoreError::InvalidResponse("row without id".to_string()))
}

fn parse_hit(row: &Value) -> Result<SearchHit, VectorStoreError> {
    Ok(SearchHit {
        id: row_id(row)?,
        distance: row.get("distance").and_then(Value::as_f64).unwrap_or_default() as f32,
        content: text_field(row, "content"),
        metadata: text_field(row, "metadata"),
    })
}

fn parse_record(row: &Value) -> Result<VectorRecord, VectorStoreError> {
    Ok(VectorRecord {
        id: row_id(row)?,
        content: text_field(row, "content"),
        metadata: text_field(row, "metadata"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_code_is_api_error() {
        let response: MilvusResponse =
            serde_json::from_str(r#"{"code":1100,"message":"collection not found"}"#).unwrap();
        match response.into_data() {
            Err(VectorStoreError::Api { code, message }) => {
                assert_eq!(code, 1100);
                assert_eq!(message, "collection not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn ids_parse_from_numbers_and_strings() {
        assert_eq!(parse_id(&json!(42)), Some(42));
        assert_eq!(parse_id(&json!("451234567890123456")), Some(451234567890123456));
        assert_eq!(parse_id(&json!("nope")), None);
        assert_eq!(parse_id(&json!(null)), None);
    }

    #[test]
    fn search_rows_parse_into_hits() {
        let data = json!([
            {"id": "7", "distance": 0.25, "content": "hello", "metadata": "m"},
            {"id": 8, "distance": 1.5, "content": "world"},
        ]);
        let hits: Vec<SearchHit> = rows(data)
            .unwrap()
            .iter()
            .map(parse_hit)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(hits[0].id, 7);
        assert_eq!(hits[0].distance, 0.25);
        assert_eq!(hits[1].metadata, "");
    }

    #[test]
    fn rows_without_id_are_rejected() {
        assert!(matches!(
            parse_record(&json!({"content": "x"})),
            Err(VectorStoreError::InvalidResponse(_))
        ));
    }

    #[test]
    fn null_data_is_empty() {
        assert!(rows(Value::Null).unwrap().is_empty());
        assert!(rows(json!({"has": true})).is_err());
    }

    #[test]
    fn create_body_describes_schema_and_index() {
        let body = create_collection_body("community_vectors", 384);
        assert_eq!(body["collectionName"], "community_vectors");
        let fields = body["schema"]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[1]["elementTypeParams"]["dim"], "384");
        assert_eq!(fields[2]["elementTypeParams"]["max_length"], "1000");
        assert_eq!(body["indexParams"][0]["metricType"], "L2");
        assert_eq!(body["indexParams"][0]["params"]["index_type"], "IVF_FLAT");
        assert_eq!(body["indexParams"][0]["params"]["nlist"], 128);
    }

    #[tokio::test]
    async fn dimension_is_checked_before_any_request() {
        let client = MilvusClient::new("http://127.0.0.1:1", None, "c", 4).unwrap();
        assert!(matches!(
            client.insert(&[1.0, 2.0], "text", "").await,
            Err(VectorStoreError::DimensionMismatch { expected: 4, actual: 2 })
        ));
        assert_eq!(client.collection_name(), "c");
        assert_eq!(client.dimension(), 4);
    }
}
