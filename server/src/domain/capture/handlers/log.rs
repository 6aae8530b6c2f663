use serde_json::{Value, json};
use tracing::Level;

use super::CaptureContext;
use crate::domain::capture::attribution::capture_stack;
use crate::domain::capture::event::{Capture, Event, entry_type};
use crate::domain::capture::registry::TypeHandler;

/// Plain log lines. Errors carry the stack that produced them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl TypeHandler for LogHandler {
    fn entry_type(&self) -> &str {
        entry_type::LOG
    }

    fn transform(&self, event: &Event, ctx: &CaptureContext) -> Option<Capture> {
        let mut context = event.fields.clone();
        if event.level == Level::ERROR {
            context.insert("debug".to_string(), Value::String(capture_stack()));
        }
        let level = event.level.as_str().to_lowercase();

        let content = json!({
            "level": level,
            "message": event.message,
            "context": context,
            "hostname": ctx.hostname(),
        });

        Some(Capture::new(ctx.entry(event, self.entry_type(), content)).tag(level))
    }
}
