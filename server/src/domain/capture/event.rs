//! Captured events and their normalized output

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::Level;

use super::attribution::CallSite;
use super::context::{Exchange, UnitContext};
use crate::data::types::Entry;

/// Type tag used when an event declares none
pub const DEFAULT_ENTRY_TYPE: &str = entry_type::LOG;

/// Built-in type tags
pub mod entry_type {
    pub const LOG: &str = "log";
    pub const QUERY: &str = "query";
    pub const REQUEST: &str = "request";
    pub const REDIS: &str = "redis";
    pub const JOB: &str = "job";
}

/// Field names with a meaning to the pipeline
pub mod field {
    pub const TYPE: &str = "type";
    pub const TAGS: &str = "tags";
    pub const ELAPSED: &str = "t";
    pub const SLOW: &str = "slow";
    pub const SHOW: &str = "show";
    pub const CONNECTION: &str = "connection";
    pub const BINDINGS: &str = "bindings";
}

/// One structured log event, snapshotted at emission
#[derive(Debug, Clone)]
pub struct Event {
    pub level: Level,
    pub message: String,
    pub fields: Map<String, Value>,
    pub call_site: Option<CallSite>,
    pub target: String,
    pub context: Option<Arc<UnitContext>>,
}

impl Event {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: Map::new(),
            call_site: None,
            target: String::new(),
            context: None,
        }
    }

    pub fn with_type(self, entry_type: &str) -> Self {
        self.with_field(field::TYPE, entry_type)
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_context(mut self, context: Arc<UnitContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }

    /// Declared type tag, `log` when absent
    pub fn entry_type(&self) -> &str {
        self.str_field(field::TYPE).unwrap_or(DEFAULT_ENTRY_TYPE)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Numeric field, accepting numbers and numeric strings
    pub fn f64_field(&self, name: &str) -> Option<f64> {
        match self.fields.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn bool_field(&self, name: &str) -> bool {
        match self.fields.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    /// User tags: a comma separated string or an array of strings
    pub fn user_tags(&self) -> Vec<String> {
        match self.fields.get(field::TAGS) {
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn exchange(&self) -> Option<&Exchange> {
        self.context.as_deref().and_then(UnitContext::exchange)
    }

    pub fn is_skipped(&self) -> bool {
        self.context.as_deref().is_some_and(UnitContext::is_skipped)
    }
}

/// An entry and the tags derived for it
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub entry: Entry,
    pub tags: Vec<String>,
}

impl Capture {
    pub fn new(entry: Entry) -> Self {
        Self {
            entry,
            tags: Vec::new(),
        }
    }

    /// Append a tag, skipping empties and duplicates
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.push_tag(tag);
        self
    }

    pub fn push_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !tag.is_empty() && !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}
