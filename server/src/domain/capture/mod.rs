//! Capture pipeline
//!
//! - `layer` - `tracing` bridge feeding events into the dispatcher
//! - `dispatcher` - capture gates and routing by type tag
//! - `registry` - handler trait and the registry keyed by type tag
//! - `handlers` - built-in log, query, request, redis and job handlers
//! - `correlation` - batch ids per execution unit
//! - `context` - task-local unit context (exchange, job data, skip mark)
//! - `attribution` - call-site recovery from textual stacks
//! - `response` - response body capture decorator
//! - `filter` - request path exclusion list
//! - `sink` - best-effort persistence

pub mod attribution;
pub mod context;
pub mod correlation;
pub mod dispatcher;
pub mod event;
pub mod filter;
pub mod handlers;
pub mod layer;
pub mod registry;
pub mod response;
pub mod sink;

pub use context::{Exchange, UnitContext, UnitId};
pub use correlation::{BatchGuard, CorrelationRegistry};
pub use dispatcher::{CaptureSettings, Dispatcher};
pub use event::{Capture, Event};
pub use filter::PathFilter;
pub use handlers::{CaptureContext, local_hostname};
pub use layer::CaptureLayer;
pub use registry::{HandlerRegistry, TypeHandler};
pub use response::{CaptureBody, CaptureWriter, CapturedResponse};
pub use sink::{EntrySink, SaveReport, SinkError, SqliteSink, save};

/// Log target prefix of the pipeline itself. Events under it are never captured.
pub(crate) const CAPTURE_TARGET: &str = module_path!();
