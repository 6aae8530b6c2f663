//! Type handler registry

use std::collections::HashMap;
use std::sync::Arc;

use super::event::{Capture, Event};
use super::handlers::{
    CaptureContext, JobHandler, LogHandler, QueryHandler, RedisHandler, RequestHandler,
};

/// Turns one kind of event into an entry and its tags
pub trait TypeHandler: Send + Sync {
    /// Tag this handler is registered under
    fn entry_type(&self) -> &str;

    /// `None` drops the event
    fn transform(&self, event: &Event, ctx: &CaptureContext) -> Option<Capture>;
}

/// Handlers keyed by type tag.
///
/// Built once at startup, then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TypeHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in log, query, request, redis and job handlers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(LogHandler);
        registry.register(QueryHandler);
        registry.register(RequestHandler);
        registry.register(RedisHandler);
        registry.register(JobHandler);
        registry
    }

    /// Register `handler` under its tag. A later registration replaces an earlier one.
    pub fn register(&mut self, handler: impl TypeHandler + 'static) {
        let handler: Arc<dyn TypeHandler> = Arc::new(handler);
        if self
            .handlers
            .insert(handler.entry_type().to_string(), Arc::clone(&handler))
            .is_some()
        {
            tracing::debug!(entry_type = handler.entry_type(), "Handler replaced");
        }
    }

    pub fn get(&self, entry_type: &str) -> Option<&Arc<dyn TypeHandler>> {
        self.handlers.get(entry_type)
    }

    pub fn contains(&self, entry_type: &str) -> bool {
        self.handlers.contains_key(entry_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("types", &types)
            .finish()
    }
}
