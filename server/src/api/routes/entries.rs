//! Entry inspection endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::types::ApiError;
use crate::core::constants::{DEFAULT_ENTRY_LIMIT, MAX_ENTRY_LIMIT};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::entry;
use crate::data::types::{Entry, ListEntriesParams};

/// Shared state for entry endpoints
#[derive(Clone)]
pub struct EntriesApiState {
    pub database: Arc<SqliteService>,
}

/// Build entry routes (mounted under `/api/v1`)
pub fn routes(database: Arc<SqliteService>) -> Router<()> {
    let state = EntriesApiState { database };

    Router::new()
        .route("/entries", get(list_entries))
        .route("/entries/{id}", get(get_entry))
        .route("/batches/{batch_id}", get(get_batch))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub batch_id: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<u32>,
}

/// Entry as returned by the API, content decoded
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: String,
    pub batch_id: String,
    pub family_hash: Option<String>,
    pub should_display_on_index: bool,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub content: Value,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl From<Entry> for EntryResponse {
    fn from(entry: Entry) -> Self {
        let content = entry.content_json();
        Self {
            id: entry.id,
            batch_id: entry.batch_id,
            family_hash: entry.family_hash,
            should_display_on_index: entry.should_display_on_index,
            entry_type: entry.entry_type,
            content,
            created_at: entry.created_at,
            tags: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListEntriesResponse {
    pub data: Vec<EntryResponse>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub batch_id: String,
    pub data: Vec<EntryResponse>,
}

/// Drop blank filters so `?type=` means "any type"
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// List entries, newest first
pub async fn list_entries(
    State(state): State<EntriesApiState>,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<ListEntriesResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ENTRY_LIMIT);
    if limit == 0 || limit > MAX_ENTRY_LIMIT {
        return Err(ApiError::bad_request(
            "INVALID_LIMIT",
            format!("limit must be between 1 and {}", MAX_ENTRY_LIMIT),
        ));
    }

    let params = ListEntriesParams {
        entry_type: non_blank(query.entry_type),
        batch_id: non_blank(query.batch_id),
        tag: non_blank(query.tag),
        limit,
    };
    let entries = entry::list_entries(state.database.pool(), &params).await?;

    Ok(Json(ListEntriesResponse {
        data: entries.into_iter().map(EntryResponse::from).collect(),
    }))
}

/// Get one entry with its tags
pub async fn get_entry(
    State(state): State<EntriesApiState>,
    Path(id): Path<String>,
) -> Result<Json<EntryResponse>, ApiError> {
    let pool = state.database.pool();
    let found = entry::get_entry(pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("ENTRY_NOT_FOUND", format!("Entry not found: {}", id)))?;
    let tags = entry::list_tags(pool, &id).await?;

    let mut response = EntryResponse::from(found);
    response.tags = Some(tags);
    Ok(Json(response))
}

/// Every entry of one batch in capture order
pub async fn get_batch(
    State(state): State<EntriesApiState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchResponse>, ApiError> {
    let entries = entry::list_batch(state.database.pool(), &batch_id).await?;
    if entries.is_empty() {
        return Err(ApiError::not_found(
            "BATCH_NOT_FOUND",
            format!("Batch not found: {}", batch_id),
        ));
    }

    Ok(Json(BatchResponse {
        batch_id,
        data: entries.into_iter().map(EntryResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::data::sqlite::test_pool;

    async fn setup() -> (Router, sqlx::SqlitePool) {
        let pool = test_pool().await;
        let database = Arc::new(SqliteService::from_pool(pool.clone()));
        (Router::new().nest("/api/v1", routes(database)), pool)
    }

    async fn seed(
        pool: &sqlx::SqlitePool,
        batch_id: &str,
        entry_type: &str,
        tags: &[&str],
    ) -> Entry {
        let entry = Entry::new(batch_id, entry_type, &json!({"message": entry_type}));
        entry::insert_entry(pool, &entry).await.unwrap();
        for tag in tags {
            entry::insert_tag(pool, &entry.id, tag).await.unwrap();
        }
        entry
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_list_entries_filters_by_type_and_tag() {
        let (router, pool) = setup().await;
        seed(&pool, "a", "log", &["info"]).await;
        let wanted = seed(&pool, "a", "log", &["error"]).await;
        seed(&pool, "a", "query", &["error"]).await;

        let (status, body) = get_json(router, "/api/v1/entries?type=log&tag=error").await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["id"], wanted.id.as_str());
        assert_eq!(data[0]["type"], "log");
        assert_eq!(data[0]["content"]["message"], "log");
    }

    #[tokio::test]
    async fn test_list_entries_rejects_bad_limit() {
        let (router, _) = setup().await;
        let (status, body) = get_json(router, "/api/v1/entries?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_LIMIT");
    }

    #[tokio::test]
    async fn test_get_entry_includes_tags() {
        let (router, pool) = setup().await;
        let stored = seed(&pool, "a", "request", &["/users/{id}", "slow"]).await;

        let (status, body) = get_json(router, &format!("/api/v1/entries/{}", stored.id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["batch_id"], "a");
        assert_eq!(body["tags"], json!(["/users/{id}", "slow"]));
    }

    #[tokio::test]
    async fn test_get_entry_not_found() {
        let (router, _) = setup().await;
        let (status, body) = get_json(router, "/api/v1/entries/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "ENTRY_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_get_batch_in_capture_order() {
        let (router, pool) = setup().await;
        let first = seed(&pool, "req-1", "query", &[]).await;
        seed(&pool, "req-2", "log", &[]).await;
        let second = seed(&pool, "req-1", "request", &[]).await;

        let (status, body) = get_json(router, "/api/v1/batches/req-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["batch_id"], "req-1");
        let ids: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
    }

    #[tokio::test]
    async fn test_unknown_batch_is_not_found() {
        let (router, _) = setup().await;
        let (status, _) = get_json(router, "/api/v1/batches/none").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
