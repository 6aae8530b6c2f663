//! Shared data types for the storage layer and the API

mod entries;

pub use entries::{Entry, ListEntriesParams};
