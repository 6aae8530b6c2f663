use serde_json::Value;

use super::CaptureContext;
use crate::domain::capture::event::{Capture, Event, entry_type};
use crate::domain::capture::registry::TypeHandler;

/// Status value that tags a job as failed
const FAILED_STATUS: &str = "failed";

/// Job runs. The runner stashes the job record on its unit before logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct JobHandler;

impl TypeHandler for JobHandler {
    fn entry_type(&self) -> &str {
        entry_type::JOB
    }

    fn transform(&self, event: &Event, ctx: &CaptureContext) -> Option<Capture> {
        let mut content = event.context.as_deref()?.job_content()?;
        content.insert(
            "hostname".to_string(),
            Value::String(ctx.hostname().to_string()),
        );
        let failed = content.get("status").and_then(Value::as_str) == Some(FAILED_STATUS);

        let mut capture = Capture::new(ctx.entry(event, self.entry_type(), Value::Object(content)));
        if failed {
            capture.push_tag(FAILED_STATUS);
        }
        Some(capture)
    }
}
