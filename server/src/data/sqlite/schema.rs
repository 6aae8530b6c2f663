//! SQLite schema definitions
//!
//! Fresh databases get the complete schema at `SCHEMA_VERSION`. Older
//! databases are brought forward by the migrations in `migrations.rs`.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Entries (one row per captured event)
-- =============================================================================
CREATE TABLE IF NOT EXISTS periscope_entries (
    id TEXT PRIMARY KEY,
    batch_id TEXT NOT NULL,
    family_hash TEXT,
    should_display_on_index INTEGER NOT NULL DEFAULT 1,
    type TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_periscope_entries_batch ON periscope_entries(batch_id);
CREATE INDEX IF NOT EXISTS idx_periscope_entries_type ON periscope_entries(type, id);

-- =============================================================================
-- 2. Entry tags (references entries)
-- =============================================================================
CREATE TABLE IF NOT EXISTS periscope_entries_tags (
    entry_uuid TEXT NOT NULL REFERENCES periscope_entries(id) ON DELETE CASCADE,
    tag TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_periscope_entries_tags_entry ON periscope_entries_tags(entry_uuid);
CREATE INDEX IF NOT EXISTS idx_periscope_entries_tags_tag ON periscope_entries_tags(tag);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version_positive() {
        assert!(SCHEMA_VERSION > 0);
    }

    #[test]
    fn test_schema_contains_required_tables() {
        let required_tables = [
            "schema_version",
            "schema_migrations",
            "periscope_entries",
            "periscope_entries_tags",
        ];

        for table in required_tables {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)),
                "Schema missing table: {}",
                table
            );
        }
    }

    #[test]
    fn test_schema_tag_index_present() {
        assert!(SCHEMA.contains("idx_periscope_entries_tags_tag"));
    }
}
