//! Built-in type handlers
//!
//! Each handler turns one kind of event into an entry plus derived tags.
//! They share a [`CaptureContext`] for the host name, batch lookup and the
//! model-layer marker used for query attribution.

mod job;
mod log;
mod query;
mod redis;
mod request;

pub use job::JobHandler;
pub use log::LogHandler;
pub use query::QueryHandler;
pub use redis::RedisHandler;
pub use request::RequestHandler;

use std::sync::Arc;

use serde_json::Value;
use sysinfo::System;

use super::correlation::CorrelationRegistry;
use super::event::Event;
use crate::core::constants::APP_NAME_LOWER;
use crate::data::types::Entry;

/// Ambient inputs shared by every handler
#[derive(Debug, Clone)]
pub struct CaptureContext {
    hostname: String,
    correlation: Arc<CorrelationRegistry>,
    model_marker: String,
}

impl CaptureContext {
    pub fn new(
        correlation: Arc<CorrelationRegistry>,
        hostname: impl Into<String>,
        model_marker: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            correlation,
            model_marker: model_marker.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn correlation(&self) -> &Arc<CorrelationRegistry> {
        &self.correlation
    }

    pub fn model_marker(&self) -> &str {
        &self.model_marker
    }

    /// Batch of the unit that produced `event`
    pub fn batch_id(&self, event: &Event) -> String {
        match &event.context {
            Some(ctx) => self.correlation.batch_id_for(ctx.unit()),
            None => self.correlation.current_batch_id(),
        }
    }

    /// Fresh entry for `event` in its batch
    pub fn entry(&self, event: &Event, entry_type: &str, content: Value) -> Entry {
        Entry::new(self.batch_id(event), entry_type, &content)
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(Arc::new(CorrelationRegistry::new()), "test@host", "/src/entity/")
    }
}

/// `periscope@<host>`, falling back to `unknown` when the OS will not say
pub fn local_hostname() -> String {
    let host = System::host_name().unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", APP_NAME_LOWER, host)
}
