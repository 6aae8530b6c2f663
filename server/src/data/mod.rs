//! Data storage layer
//!
//! - `sqlite` - local database holding captured entries and their tags
//! - `types` - row and query types shared with the API

pub mod sqlite;
pub mod types;

pub use sqlite::{SqliteError, SqliteService};
