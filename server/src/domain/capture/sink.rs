//! Persistence sink
//!
//! Captures are written best effort: the entry first, then each tag on its
//! own. Nothing here reports failure back to instrumented code.

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;

use super::event::Capture;
use crate::data::sqlite::SqliteError;
use crate::data::sqlite::repositories::entry;
use crate::data::types::Entry;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Sqlite(#[from] SqliteError),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Storage seam with the two writes the pipeline needs
#[async_trait]
pub trait EntrySink: Send + Sync {
    async fn create_entry(&self, entry: &Entry) -> Result<(), SinkError>;

    async fn create_tag(&self, entry_id: &str, tag: &str) -> Result<(), SinkError>;
}

/// What one `save` call managed to write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub entry_written: bool,
    pub tags_written: usize,
    pub tags_failed: usize,
}

/// Persist a capture. Tags are only attempted once the entry is stored.
pub async fn save(sink: &dyn EntrySink, capture: Capture) -> SaveReport {
    let mut report = SaveReport::default();
    let Capture { entry, tags } = capture;

    if let Err(e) = sink.create_entry(&entry).await {
        tracing::debug!(entry_id = %entry.id, error = %e, "Entry write failed");
        return report;
    }
    report.entry_written = true;

    for tag in &tags {
        match sink.create_tag(&entry.id, tag).await {
            Ok(()) => report.tags_written += 1,
            Err(e) => {
                report.tags_failed += 1;
                tracing::debug!(entry_id = %entry.id, %tag, error = %e, "Tag write failed");
            }
        }
    }

    report
}

/// Sink backed by the local SQLite database
#[derive(Debug, Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntrySink for SqliteSink {
    async fn create_entry(&self, entry: &Entry) -> Result<(), SinkError> {
        entry::insert_entry(&self.pool, entry).await?;
        Ok(())
    }

    async fn create_tag(&self, entry_id: &str, tag: &str) -> Result<(), SinkError> {
        entry::insert_tag(&self.pool, entry_id, tag).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// In-memory sink with switchable failures
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub entries: Mutex<Vec<Entry>>,
        pub tags: Mutex<Vec<(String, String)>>,
        pub tag_attempts: Mutex<Vec<String>>,
        pub fail_entries: bool,
        pub fail_tags: Vec<String>,
    }

    impl RecordingSink {
        pub fn entries(&self) -> Vec<Entry> {
            self.entries.lock().clone()
        }

        pub fn tags(&self) -> Vec<(String, String)> {
            self.tags.lock().clone()
        }
    }

    #[async_trait]
    impl EntrySink for RecordingSink {
        async fn create_entry(&self, entry: &Entry) -> Result<(), SinkError> {
            if self.fail_entries {
                return Err(SinkError::Unavailable("entries offline".to_string()));
            }
            self.entries.lock().push(entry.clone());
            Ok(())
        }

        async fn create_tag(&self, entry_id: &str, tag: &str) -> Result<(), SinkError> {
            self.tag_attempts.lock().push(tag.to_string());
            if self.fail_tags.iter().any(|t| t == tag) {
                return Err(SinkError::Unavailable(format!("tag {tag} rejected")));
            }
            self.tags.lock().push((entry_id.to_string(), tag.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::data::sqlite::test_pool;
    use serde_json::json;

    fn capture_with_tags(tags: &[&str]) -> Capture {
        let mut capture = Capture::new(Entry::new("batch-1", "request", &json!({"uri": "/"})));
        for tag in tags {
            capture.push_tag(*tag);
        }
        capture
    }

    #[tokio::test]
    async fn test_entry_failure_skips_tags() {
        let sink = RecordingSink {
            fail_entries: true,
            ..Default::default()
        };
        let report = save(&sink, capture_with_tags(&["a", "b"])).await;
        assert!(!report.entry_written);
        assert!(sink.tag_attempts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_tag_failure_does_not_block_siblings() {
        let sink = RecordingSink {
            fail_tags: vec!["b".to_string()],
            ..Default::default()
        };
        let report = save(&sink, capture_with_tags(&["a", "b", "c"])).await;
        assert_eq!(
            report,
            SaveReport {
                entry_written: true,
                tags_written: 2,
                tags_failed: 1
            }
        );
        assert_eq!(*sink.tag_attempts.lock(), vec!["a", "b", "c"]);
        assert_eq!(sink.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_sink_round_trip() {
        let pool = test_pool().await;
        let sink = SqliteSink::new(pool.clone());
        let capture = capture_with_tags(&["/users/{id}", "vip"]);
        let id = capture.entry.id.clone();

        let report = save(&sink, capture).await;
        assert!(report.entry_written);
        assert_eq!(report.tags_written, 2);

        let tags = entry::list_tags(&pool, &id).await.unwrap();
        assert_eq!(tags, vec!["/users/{id}", "vip"]);
    }

    #[tokio::test]
    async fn test_sqlite_sink_duplicate_entry_fails_quietly() {
        let pool = test_pool().await;
        let sink = SqliteSink::new(pool);
        let capture = capture_with_tags(&["x"]);
        assert!(save(&sink, capture.clone()).await.entry_written);
        let report = save(&sink, capture).await;
        assert!(!report.entry_written);
        assert_eq!(report.tags_written, 0);
    }
}
