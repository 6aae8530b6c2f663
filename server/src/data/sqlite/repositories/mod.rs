//! SQLite repositories
//!
//! Row types (Entry, ListEntriesParams) are imported from `crate::data::types`.

pub mod entry;

pub use entry::{get_entry, insert_entry, insert_tag, list_batch, list_entries, list_tags};
