//! Call-site attribution from textual stack snapshots
//!
//! Two jobs, both driven by plain text so they work on whatever the runtime
//! renders:
//!
//! - recover a numeric unit id from an identity header (`ThreadId(7)`)
//! - find the application frame that called into the model layer
//!
//! Both depend on the rendering format of `std` staying stable. When the
//! format is not recognised the result is empty, never an error.

use std::backtrace::Backtrace;

/// Number of trailing path segments kept for an attributed file
const KEPT_PATH_SEGMENTS: usize = 4;

/// Location prefix used by `std::backtrace` frame lines
const LOCATION_PREFIX: &str = "at ";

/// A resolved call site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub file: String,
    pub line: String,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: line.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_empty()
    }
}

/// Result of walking a stack for the model marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelAttribution {
    /// First frame inside the model layer (`path:line`)
    pub model: Option<String>,
    /// First application frame after control left the model layer
    pub caller: CallSite,
}

/// Parse the numeric id out of an identity header.
///
/// Strips `prefix`, reads up to `delimiter` and parses the digits. Returns 0
/// when the header does not have the expected shape.
pub fn parse_unit_header(text: &str, prefix: &str, delimiter: char) -> u64 {
    let Some(rest) = text.trim_start().strip_prefix(prefix) else {
        return 0;
    };
    let digits = match rest.find(delimiter) {
        Some(end) => &rest[..end],
        None => return 0,
    };
    digits.trim().parse::<u64>().unwrap_or(0)
}

/// Render a full backtrace of the calling thread
pub fn capture_stack() -> String {
    Backtrace::force_capture().to_string()
}

/// First frame whose path does not contain `internal_prefix`
pub fn caller_outside(stack: &str, internal_prefix: &str) -> Option<CallSite> {
    frame_locations(stack)
        .find(|(path, _)| !path.contains(internal_prefix))
        .map(|(path, line)| CallSite::new(shorten_path(path), line))
}

/// Frame that called into the code under `internal_prefix`.
///
/// Frames above the first internal one belong to the unwinder and are
/// skipped. `None` when the stack never enters the internal code.
pub fn entry_caller(stack: &str, internal_prefix: &str) -> Option<CallSite> {
    let first = stack.find(internal_prefix)?;
    let start = stack[..first].rfind('\n').map_or(0, |newline| newline + 1);
    caller_outside(&stack[start..], internal_prefix)
}

/// Attribute a model-layer call to the application code that made it.
///
/// Frames containing `marker` belong to the model layer. The model calls
/// into itself before reaching storage, so once the marker has been seen
/// twice the next frame outside it is the caller.
pub fn model_caller(stack: &str, marker: &str) -> ModelAttribution {
    let mut attribution = ModelAttribution::default();
    if marker.is_empty() {
        return attribution;
    }

    let mut hits = 0usize;
    for (path, line) in frame_locations(stack) {
        if hits < 2 {
            if let Some(index) = path.find(marker) {
                hits += 1;
                if attribution.model.is_none() {
                    attribution.model = Some(format!("{}:{}", &path[index..], line));
                }
            }
        } else if !path.contains(marker) {
            attribution.caller = CallSite::new(shorten_path(path), line);
            break;
        }
    }

    attribution
}

/// Keep the last few segments of a path, prefixed with `/`
pub fn shorten_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let start = segments.len().saturating_sub(KEPT_PATH_SEGMENTS);
    segments[start..]
        .iter()
        .fold(String::new(), |mut acc, segment| {
            acc.push('/');
            acc.push_str(segment);
            acc
        })
}

/// Iterate `(path, line)` pairs from `at path:line:col` lines
fn frame_locations(stack: &str) -> impl Iterator<Item = (&str, &str)> {
    stack.lines().filter_map(|raw| {
        let location = raw.trim().strip_prefix(LOCATION_PREFIX)?;
        split_location(location)
    })
}

/// Split `path:line:col` (or `path:line`) into path and line
fn split_location(location: &str) -> Option<(&str, &str)> {
    let (rest, last) = location.rsplit_once(':')?;
    if last.is_empty() || !last.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match rest.rsplit_once(':') {
        Some((path, line)) if !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()) => {
            Some((path, line))
        }
        _ => Some((rest, last)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = "\
   0: periscope_server::domain::capture::attribution::capture_stack
             at ./server/src/domain/capture/attribution.rs:60:5
   1: shop::entity::order::Order::save
             at /home/dev/shop/src/entity/order.rs:88:9
   2: shop::entity::base::Model::insert
             at /home/dev/shop/src/entity/base.rs:21:13
   3: shop::service::checkout::place_order
             at /home/dev/shop/src/service/checkout.rs:142:17
   4: shop::api::orders::create
             at /home/dev/shop/src/api/orders.rs:30:5";

    #[test]
    fn test_parse_unit_header_thread_id() {
        assert_eq!(parse_unit_header("ThreadId(17)", "ThreadId(", ')'), 17);
    }

    #[test]
    fn test_parse_unit_header_goroutine_style() {
        assert_eq!(
            parse_unit_header("goroutine 42 [running]:", "goroutine ", ' '),
            42
        );
    }

    #[test]
    fn test_parse_unit_header_malformed_is_zero() {
        assert_eq!(parse_unit_header("", "ThreadId(", ')'), 0);
        assert_eq!(parse_unit_header("Thread(5)", "ThreadId(", ')'), 0);
        assert_eq!(parse_unit_header("ThreadId(abc)", "ThreadId(", ')'), 0);
        assert_eq!(parse_unit_header("ThreadId(12", "ThreadId(", ')'), 0);
    }

    #[test]
    fn test_model_caller_after_two_model_frames() {
        let attribution = model_caller(STACK, "/src/entity/");
        assert_eq!(
            attribution.caller,
            CallSite::new("/shop/src/service/checkout.rs", "142")
        );
        assert_eq!(
            attribution.model.as_deref(),
            Some("/src/entity/order.rs:88")
        );
    }

    #[test]
    fn test_model_caller_single_model_frame_yields_empty() {
        let stack = "\
   0: shop::entity::order::Order::save
             at /home/dev/shop/src/entity/order.rs:88:9
   1: shop::service::checkout::place_order
             at /home/dev/shop/src/service/checkout.rs:142:17";
        let attribution = model_caller(stack, "/src/entity/");
        assert!(attribution.caller.is_empty());
        assert_eq!(attribution.caller.line, "");
    }

    #[test]
    fn test_model_caller_no_marker_yields_empty() {
        let attribution = model_caller(STACK, "/src/models/");
        assert!(attribution.caller.is_empty());
        assert!(attribution.model.is_none());
    }

    #[test]
    fn test_caller_outside_skips_internal_frames() {
        let site = caller_outside(STACK, "/capture/").unwrap();
        assert_eq!(site, CallSite::new("/shop/src/entity/order.rs", "88"));
    }

    #[test]
    fn test_caller_outside_all_internal() {
        assert!(caller_outside(STACK, "/").is_none());
    }

    #[test]
    fn test_entry_caller_skips_unwinder_frames() {
        let stack = "\
   0: std::backtrace::Backtrace::create
             at /rustc/abc123/library/std/src/backtrace.rs:331:13
   1: periscope_server::domain::capture::handlers::query::QueryHandler::transform
             at ./server/src/domain/capture/handlers/query.rs:40:9
   2: periscope_server::domain::capture::dispatcher::Dispatcher::capture
             at ./server/src/domain/capture/dispatcher.rs:91:27
   3: shop::jobs::nightly::report
             at /home/dev/shop/src/jobs/nightly.rs:12:5";
        assert_eq!(
            entry_caller(stack, "src/domain/capture/"),
            Some(CallSite::new("/shop/src/jobs/nightly.rs", "12"))
        );
        assert_eq!(
            caller_outside(stack, "src/domain/capture/"),
            Some(CallSite::new("/library/std/src/backtrace.rs", "331"))
        );
    }

    #[test]
    fn test_entry_caller_never_entered() {
        assert!(entry_caller(STACK, "/src/jobs/").is_none());
    }

    #[test]
    fn test_shorten_path_keeps_last_segments() {
        assert_eq!(shorten_path("/a/b/c/d/e/f.rs"), "/c/d/e/f.rs");
        assert_eq!(shorten_path("src/lib.rs"), "/src/lib.rs");
    }

    #[test]
    fn test_split_location_without_column() {
        assert_eq!(split_location("/x/y.rs:12"), Some(("/x/y.rs", "12")));
        assert_eq!(split_location("/x/y.rs:12:4"), Some(("/x/y.rs", "12")));
        assert_eq!(split_location("/x/y.rs"), None);
    }

    #[test]
    fn test_capture_stack_is_not_empty() {
        assert!(!capture_stack().is_empty());
    }
}
