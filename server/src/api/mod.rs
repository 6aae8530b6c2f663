//! API server, capture middleware and inspection routes

pub mod middleware;
pub mod routes;
mod server;
pub mod types;

pub use middleware::{CaptureState, capture_request};
pub use server::ApiServer;
