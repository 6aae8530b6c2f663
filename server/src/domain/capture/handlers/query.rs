use serde_json::{Value, json};

use super::CaptureContext;
use crate::core::constants::TABLE_PREFIX;
use crate::domain::capture::attribution::{CallSite, capture_stack, entry_caller, model_caller};
use crate::domain::capture::event::{Capture, Event, entry_type, field};
use crate::domain::capture::registry::TypeHandler;
use crate::utils::crypto::sha256_hex;

/// Connection label when neither the event nor the stack names one
const DEFAULT_CONNECTION: &str = "default";

/// Length of the statement hash kept in the content
const QUERY_HASH_LEN: usize = 16;

/// Source directory of the capture pipeline, as it appears in backtraces
const PIPELINE_SOURCE: &str = "src/domain/capture/";

/// SQL statements, attributed to the application code that issued them
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryHandler;

impl TypeHandler for QueryHandler {
    fn entry_type(&self) -> &str {
        entry_type::QUERY
    }

    fn transform(&self, event: &Event, ctx: &CaptureContext) -> Option<Capture> {
        // Writes to our own tables would otherwise capture themselves
        if event.message.contains(TABLE_PREFIX) {
            return None;
        }

        let (site, connection) = attribute(&capture_stack(), event, ctx.model_marker());
        let time = event
            .f64_field(field::ELAPSED)
            .map(|t| format!("{:.2}", t))
            .unwrap_or_else(|| "0".to_string());
        let bindings = event
            .fields
            .get(field::BINDINGS)
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let slow = event.bool_field(field::SLOW);
        let show = event.bool_field(field::SHOW);
        let mut hash = sha256_hex(&event.message);
        hash.truncate(QUERY_HASH_LEN);

        let content = json!({
            "connection": connection,
            "bindings": bindings,
            "sql": event.message,
            "time": time,
            "slow": slow,
            "file": site.file,
            "line": site.line,
            "hash": hash,
            "hostname": ctx.hostname(),
        });

        let mut capture = Capture::new(ctx.entry(event, self.entry_type(), content));
        if slow {
            capture.push_tag(field::SLOW);
        }
        if show {
            capture.push_tag(field::SHOW);
        }
        Some(capture)
    }
}

/// Call site and connection label for a statement.
///
/// The site is the application frame that called into the model layer, then
/// the event's own call site, then whatever frame entered the pipeline. The
/// connection is the event's field, then the model frame, then the entering
/// frame as `file:line`.
fn attribute(stack: &str, event: &Event, marker: &str) -> (CallSite, String) {
    let attribution = model_caller(stack, marker);
    let origin = entry_caller(stack, PIPELINE_SOURCE);

    let site = if !attribution.caller.is_empty() {
        attribution.caller
    } else if let Some(site) = event.call_site.clone().filter(|site| !site.is_empty()) {
        site
    } else {
        origin.clone().unwrap_or_default()
    };
    let connection = event
        .str_field(field::CONNECTION)
        .map(String::from)
        .or(attribution.model)
        .or_else(|| origin.map(|origin| format!("{}:{}", origin.file, origin.line)))
        .unwrap_or_else(|| DEFAULT_CONNECTION.to_string());

    (site, connection)
}
