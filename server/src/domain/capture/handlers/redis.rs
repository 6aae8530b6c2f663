use serde_json::json;

use super::CaptureContext;
use crate::domain::capture::event::{Capture, Event, entry_type, field};
use crate::domain::capture::registry::TypeHandler;

/// Default connection label for cache commands
const DEFAULT_CONNECTION: &str = "cache";

/// Cache commands. The message is the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisHandler;

impl TypeHandler for RedisHandler {
    fn entry_type(&self) -> &str {
        entry_type::REDIS
    }

    fn transform(&self, event: &Event, ctx: &CaptureContext) -> Option<Capture> {
        let connection = event
            .str_field(field::CONNECTION)
            .unwrap_or(DEFAULT_CONNECTION);

        let content = json!({
            "connection": connection,
            "command": event.message,
            "time": "0",
            "hostname": ctx.hostname(),
        });

        Some(Capture::new(ctx.entry(event, self.entry_type(), content)))
    }
}
