//! Entry repository for SQLite operations
//!
//! Entries are written by the capture sink and read back by the inspection
//! API. Ids are UUIDv7, so ordering by id is ordering by capture time.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{Entry, ListEntriesParams};

type EntryRow = (String, String, Option<String>, bool, String, String, String);

const ENTRY_COLUMNS: &str =
    "e.id, e.batch_id, e.family_hash, e.should_display_on_index, e.type, e.content, e.created_at";

fn row_to_entry(row: EntryRow) -> Entry {
    let (id, batch_id, family_hash, should_display_on_index, entry_type, content, created_at) =
        row;
    Entry {
        id,
        batch_id,
        family_hash,
        should_display_on_index,
        entry_type,
        content,
        created_at,
    }
}

/// Insert a captured entry
pub async fn insert_entry(pool: &SqlitePool, entry: &Entry) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO periscope_entries
            (id, batch_id, family_hash, should_display_on_index, type, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.batch_id)
    .bind(&entry.family_hash)
    .bind(entry.should_display_on_index)
    .bind(&entry.entry_type)
    .bind(&entry.content)
    .bind(&entry.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Attach a tag to an entry. Fails when the entry does not exist.
pub async fn insert_tag(pool: &SqlitePool, entry_id: &str, tag: &str) -> Result<(), SqliteError> {
    sqlx::query("INSERT INTO periscope_entries_tags (entry_uuid, tag) VALUES (?, ?)")
        .bind(entry_id)
        .bind(tag)
        .execute(pool)
        .await?;

    Ok(())
}

/// Tags of an entry in insertion order
pub async fn list_tags(pool: &SqlitePool, entry_id: &str) -> Result<Vec<String>, SqliteError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tag FROM periscope_entries_tags WHERE entry_uuid = ? ORDER BY rowid",
    )
    .bind(entry_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(tag,)| tag).collect())
}

/// Get an entry by ID
pub async fn get_entry(pool: &SqlitePool, id: &str) -> Result<Option<Entry>, SqliteError> {
    let query = format!("SELECT {} FROM periscope_entries e WHERE e.id = ?", ENTRY_COLUMNS);
    let row: Option<EntryRow> = sqlx::query_as(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(row_to_entry))
}

/// List entries newest first, filtered by type, batch and tag
pub async fn list_entries(
    pool: &SqlitePool,
    params: &ListEntriesParams,
) -> Result<Vec<Entry>, SqliteError> {
    let mut conditions = Vec::new();
    if params.entry_type.is_some() {
        conditions.push("e.type = ?");
    }
    if params.batch_id.is_some() {
        conditions.push("e.batch_id = ?");
    }
    if params.tag.is_some() {
        conditions.push(
            "EXISTS (SELECT 1 FROM periscope_entries_tags t WHERE t.entry_uuid = e.id AND t.tag = ?)",
        );
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let query = format!(
        "SELECT {} FROM periscope_entries e {} ORDER BY e.id DESC LIMIT ?",
        ENTRY_COLUMNS, where_clause
    );

    let mut query_builder = sqlx::query_as::<_, EntryRow>(&query);
    for value in [&params.entry_type, &params.batch_id, &params.tag]
        .into_iter()
        .flatten()
    {
        query_builder = query_builder.bind(value);
    }

    let rows = query_builder
        .bind(i64::from(params.limit))
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(row_to_entry).collect())
}

/// All entries of one batch in capture order
pub async fn list_batch(pool: &SqlitePool, batch_id: &str) -> Result<Vec<Entry>, SqliteError> {
    let query = format!(
        "SELECT {} FROM periscope_entries e WHERE e.batch_id = ? ORDER BY e.id ASC",
        ENTRY_COLUMNS
    );
    let rows: Vec<EntryRow> = sqlx::query_as(&query)
        .bind(batch_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(row_to_entry).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;
    use serde_json::json;

    async fn seed(pool: &SqlitePool, batch_id: &str, entry_type: &str, tags: &[&str]) -> Entry {
        let entry = Entry::new(batch_id, entry_type, &json!({"seeded": true}));
        insert_entry(pool, &entry).await.unwrap();
        for tag in tags {
            insert_tag(pool, &entry.id, tag).await.unwrap();
        }
        entry
    }

    fn params(limit: u32) -> ListEntriesParams {
        ListEntriesParams {
            limit,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_entry() {
        let pool = test_pool().await;
        let entry = seed(&pool, "batch-1", "log", &[]).await;

        let fetched = get_entry(&pool, &entry.id).await.unwrap().unwrap();
        assert_eq!(fetched, entry);
        assert!(get_entry(&pool, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let pool = test_pool().await;
        let entry = seed(&pool, "batch-1", "log", &[]).await;
        assert!(insert_entry(&pool, &entry).await.is_err());
    }

    #[tokio::test]
    async fn test_tags_keep_insertion_order() {
        let pool = test_pool().await;
        let entry = seed(&pool, "batch-1", "request", &["/users/{id}", "slow", "vip"]).await;
        let tags = list_tags(&pool, &entry.id).await.unwrap();
        assert_eq!(tags, vec!["/users/{id}", "slow", "vip"]);
    }

    #[tokio::test]
    async fn test_tag_requires_entry() {
        let pool = test_pool().await;
        assert!(insert_tag(&pool, "no-such-entry", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_list_entries_newest_first_with_limit() {
        let pool = test_pool().await;
        let first = seed(&pool, "a", "log", &[]).await;
        let second = seed(&pool, "a", "query", &[]).await;
        let third = seed(&pool, "b", "log", &[]).await;

        let all = list_entries(&pool, &params(10)).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);

        let limited = list_entries(&pool, &params(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, third.id);
    }

    #[tokio::test]
    async fn test_list_entries_filters_combine() {
        let pool = test_pool().await;
        seed(&pool, "a", "log", &["warn"]).await;
        let wanted = seed(&pool, "a", "log", &["error"]).await;
        seed(&pool, "b", "log", &["error"]).await;
        seed(&pool, "a", "query", &["error"]).await;

        let found = list_entries(
            &pool,
            &ListEntriesParams {
                entry_type: Some("log".to_string()),
                batch_id: Some("a".to_string()),
                tag: Some("error".to_string()),
                limit: 10,
            },
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, wanted.id);
    }

    #[tokio::test]
    async fn test_list_batch_in_capture_order() {
        let pool = test_pool().await;
        let first = seed(&pool, "req-1", "query", &[]).await;
        seed(&pool, "req-2", "log", &[]).await;
        let second = seed(&pool, "req-1", "request", &[]).await;

        let batch = list_batch(&pool, "req-1").await.unwrap();
        let ids: Vec<&str> = batch.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
    }
}
