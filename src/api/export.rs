// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CSV export of the vector collection.

use std::path::PathBuf;

use axum::extract::State;
use chrono::Local;
use tracing::{error, info, warn};

use crate::{
    auth::OptionalAuth,
    error::{ApiError, ApiResponse},
    models::ExportResponse,
    providers::{milvus::QUERY_LIMIT_MAX, VectorRecord},
    state::AppState,
};

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render records as CSV with an `id,content,metadata` header and CRLF line endings.
fn render_csv(records: &[VectorRecord]) -> String {
    let mut out = String::from("id,content,metadata\r\n");
    for record in records {
        out.push_str(&format!(
            "{},{},{}\r\n",
            record.id,
            csv_field(&record.content),
            csv_field(&record.metadata)
        ));
    }
    out
}

fn export_file_name() -> String {
    format!("vectors_export_{}.csv", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Write every stored text to a timestamped CSV file on the server.
///
/// A token is optional; when present, the caller is logged.
#[utoipa::path(
    get,
    path = "/api/database/export-csv/",
    tag = "Database",
    responses(
        (status = 200, description = "Export written", body = ExportResponse),
        (status = 503, description = "Vector database unavailable"),
        (status = 500, description = "Query or file write failed")
    )
)]
pub async fn export_csv(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
) -> Result<ApiResponse<ExportResponse>, ApiError> {
    let requester = identity.map(|i| i.subject);
    info!(requester = requester.as_deref().unwrap_or("anonymous"), "CSV export requested");

    state.vectors.ensure_collection().await.map_err(|e| {
        warn!(error = %e, "Vector collection unavailable for export");
        ApiError::unavailable("Vector database unavailable")
    })?;

    let records = state
        .vectors
        .query_all(QUERY_LIMIT_MAX)
        .await
        .map_err(|e| {
            error!(error = %e, "Vector query failed");
            ApiError::internal("Export failed")
        })?;

    let dir = &state.settings.export_dir;
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        error!(error = %e, dir = %dir.display(), "Cannot create export directory");
        ApiError::internal("Export failed")
    })?;

    let path: PathBuf = dir.join(export_file_name());
    tokio::fs::write(&path, render_csv(&records))
        .await
        .map_err(|e| {
            error!(error = %e, path = %path.display(), "Cannot write export file");
            ApiError::internal("Export failed")
        })?;

    info!(path = %path.display(), total_records = records.len(), "CSV export written");
    Ok(ApiResponse::ok(
        "Export completed",
        ExportResponse {
            file_path: path.display().to_string(),
            total_records: records.len(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::http::StatusCode;

    use super::*;
    use crate::auth::Identity;
    use crate::providers::VectorStore;
    use crate::testing::harness;

    #[test]
    fn fields_are_quoted_only_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn csv_has_header_and_rows() {
        let csv = render_csv(&[
            VectorRecord {
                id: 7,
                content: "hello, world".to_string(),
                metadata: String::new(),
            },
            VectorRecord {
                id: 8,
                content: "second".to_string(),
                metadata: "m".to_string(),
            },
        ]);
        assert_eq!(
            csv,
            "id,content,metadata\r\n7,\"hello, world\",\r\n8,second,m\r\n"
        );
    }

    #[test]
    fn file_name_is_timestamped() {
        let name = export_file_name();
        assert!(name.starts_with("vectors_export_"));
        assert!(name.ends_with(".csv"));
        // vectors_export_ + YYYYMMDD_HHMMSS + .csv
        assert_eq!(name.len(), "vectors_export_".len() + 15 + ".csv".len());
    }

    #[tokio::test]
    async fn export_writes_all_records() {
        let h = harness();
        h.vectors.insert(&[0.0; 8], "first", "a").await.unwrap();
        h.vectors.insert(&[1.0; 8], "second, with comma", "").await.unwrap();

        let response = export_csv(
            State(h.state.clone()),
            OptionalAuth(Some(Identity::for_subject("u123"))),
        )
        .await
        .unwrap();
        let data = response.data.unwrap();
        assert_eq!(data.total_records, 2);

        let written = std::fs::read_to_string(&data.file_path).unwrap();
        assert!(written.starts_with("id,content,metadata\r\n"));
        assert!(written.contains("1,first,a\r\n"));
        assert!(written.contains("2,\"second, with comma\",\r\n"));
        assert!(data.file_path.starts_with(&h.dir.path().display().to_string()));
    }

    #[tokio::test]
    async fn anonymous_export_of_empty_store() {
        let h = harness();
        let response = export_csv(State(h.state.clone()), OptionalAuth(None))
            .await
            .unwrap();
        let data = response.data.unwrap();
        assert_eq!(data.total_records, 0);
        assert_eq!(
            std::fs::read_to_string(&data.file_path).unwrap(),
            "id,content,metadata\r\n"
        );
    }

    #[tokio::test]
    async fn unavailable_store_is_503() {
        let h = harness();
        h.vectors.online.store(false, Ordering::SeqCst);
        let err = export_csv(State(h.state.clone()), OptionalAuth(None))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
