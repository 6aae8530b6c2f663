//! Domain logic
//!
//! - `capture` - telemetry capture, correlation and persistence pipeline

pub mod capture;

pub use capture::{CaptureLayer, CorrelationRegistry, Dispatcher, HandlerRegistry};
