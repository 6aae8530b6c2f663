//! `tracing` bridge
//!
//! [`CaptureLayer`] sits in the subscriber stack next to the fmt layer and
//! feeds every event into the [`Dispatcher`].

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event as TracingEvent, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::attribution::CallSite;
use super::context;
use super::dispatcher::Dispatcher;
use super::event::Event;

/// Targets whose events never reach the dispatcher
const IGNORED_TARGETS: &[&str] = &[super::CAPTURE_TARGET, "sqlx"];

pub struct CaptureLayer {
    dispatcher: Arc<Dispatcher>,
}

impl CaptureLayer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &TracingEvent<'_>, _ctx: Context<'_, S>) {
        if !self.dispatcher.settings().is_enabled() {
            return;
        }
        let metadata = event.metadata();
        if is_ignored(metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut captured = Event::new(*metadata.level(), visitor.message);
        captured.fields = visitor.fields;
        captured.target = metadata.target().to_string();
        if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
            captured.call_site = Some(CallSite::new(file, line.to_string()));
        }
        captured.context = context::current();

        self.dispatcher.submit(&captured);
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target == *ignored
            || target
                .strip_prefix(ignored)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

/// Collects an event's fields into JSON values
#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        let name = field.name();
        let name = name.strip_prefix("r#").unwrap_or(name);
        self.fields.insert(name.to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.insert(field, Value::String(format!("{:?}", value)));
        }
    }
}
