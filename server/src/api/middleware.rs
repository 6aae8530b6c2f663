//! HTTP middleware (request capture, CORS, 404 handler)

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Form;
use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequest, MatchedPath, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{StreamExt, stream};
use serde_json::{Map, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::Level;

use super::types::ApiError;
use crate::core::config::is_all_interfaces;
use crate::core::constants::CAPTURE_REQUEST_BODY_LIMIT;
use crate::domain::capture::context::{self, Exchange, UnitContext};
use crate::domain::capture::event::{Event, entry_type};
use crate::domain::capture::{CaptureBody, CapturedResponse, Dispatcher, PathFilter};

// ============================================================================
// Request capture
// ============================================================================

/// State for [`capture_request`]
#[derive(Clone)]
pub struct CaptureState {
    pub dispatcher: Arc<Dispatcher>,
    pub filter: Arc<PathFilter>,
    pub max_body_bytes: usize,
}

/// Run each request as its own capture unit.
///
/// Opens a batch, runs the handler inside the unit's context and emits the
/// `request` event once the response body has been fully sent. The batch
/// closes after that event, so everything logged while streaming the body
/// still correlates. Excluded paths run in a skipped unit with no batch.
/// When only errors are captured the request is never recorded, so the unit
/// just gets a batch for its error logs.
///
/// Apply with `Router::layer` so the matched route is known.
pub async fn capture_request(
    State(state): State<CaptureState>,
    req: Request,
    next: Next,
) -> Response {
    if state.filter.is_excluded(req.uri().path()) {
        return context::scope(Arc::new(UnitContext::skipped()), next.run(req)).await;
    }
    let settings = state.dispatcher.settings();
    if !settings.is_enabled() {
        return next.run(req).await;
    }
    if settings.errors_only() {
        let ctx = Arc::new(UnitContext::new());
        return state.dispatcher.correlation().scope_with(ctx, next.run(req)).await;
    }

    let captured = Arc::new(CapturedResponse::new(state.max_body_bytes));
    let (req, exchange) = snapshot_request(req, Arc::clone(&captured)).await;
    let message = exchange.uri.clone();
    let ctx = Arc::new(UnitContext::for_exchange(exchange));
    let guard = state.dispatcher.correlation().begin(ctx.unit());

    let response = context::scope(Arc::clone(&ctx), next.run(req)).await;
    captured.set_status(response.status().as_u16());

    let dispatcher = state.dispatcher;
    let (parts, body) = response.into_parts();
    let body = CaptureBody::new(body, captured).on_complete(move || {
        let event = Event::new(Level::INFO, message)
            .with_type(entry_type::REQUEST)
            .with_context(Arc::clone(&ctx));
        context::sync_scope(ctx, || dispatcher.submit(&event));
        drop(guard);
    });

    Response::from_parts(parts, Body::new(body))
}

/// Record the request side of the exchange, buffering small bodies.
///
/// A body that fails or outgrows its declared length is not recorded and is
/// replayed to the handler unchanged.
async fn snapshot_request(req: Request, response: Arc<CapturedResponse>) -> (Request, Exchange) {
    let mut exchange = Exchange::new(req.method().as_str(), req.uri().to_string(), response);
    exchange.client_ip = client_ip(&req);
    exchange.headers = header_map(req.headers());
    exchange.matched_route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());

    let declared_len = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    let Some(len) = declared_len.filter(|len| *len > 0 && *len <= CAPTURE_REQUEST_BODY_LIMIT)
    else {
        return (req, exchange);
    };

    let is_form = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

    let (parts, body) = req.into_parts();
    let mut data = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut received = 0usize;
    let mut failure = None;
    let complete = loop {
        match data.next().await {
            Some(Ok(chunk)) => {
                received += chunk.len();
                chunks.push(chunk);
                if received > len {
                    break false;
                }
            }
            Some(Err(e)) => {
                failure = Some(e);
                break false;
            }
            None => break true,
        }
    };

    // Replay what was read, then the failure and the rest of the stream
    if !complete {
        tracing::debug!(declared = len, received, "Request body not buffered");
        let replay = stream::iter(chunks.into_iter().map(Ok).chain(failure.map(Err))).chain(data);
        return (Request::from_parts(parts, Body::from_stream(replay)), exchange);
    }

    let bytes = Bytes::from(chunks.concat());
    if is_form {
        exchange.form = parse_form(bytes.clone()).await;
    }
    exchange.body = Some(bytes.clone());

    (Request::from_parts(parts, Body::from(bytes)), exchange)
}

/// Decode a urlencoded body into a JSON object
async fn parse_form(bytes: Bytes) -> Option<Map<String, Value>> {
    let mut req = Request::new(Body::from(bytes));
    *req.method_mut() = Method::POST;
    req.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );

    let Form(fields) = Form::<HashMap<String, String>>::from_request(req, &()).await.ok()?;
    Some(
        fields
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    )
}

/// Client address: first forwarded hop, then the real-ip header, then the peer
fn client_ip(req: &Request) -> String {
    let header_value = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(',').next().unwrap_or_default().trim().to_string())
            .filter(|value| !value.is_empty())
    };

    header_value("x-forwarded-for")
        .or_else(|| header_value("x-real-ip"))
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_default()
}

/// Header name to the list of its values
fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    let mut map = Map::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|value| Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        map.insert(name.to_string(), Value::Array(values));
    }
    map
}

// ============================================================================
// CORS and fallback
// ============================================================================

/// Allowed origins configuration
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Origins a browser on the same machine may use
    pub fn new(host: &str, port: u16) -> Self {
        let base_hosts: Vec<&str> =
            if is_all_interfaces(host) || host == "127.0.0.1" || host == "localhost" {
                vec!["localhost", "127.0.0.1"]
            } else {
                vec![host]
            };

        let origins = base_hosts
            .iter()
            .flat_map(|h| [format!("http://{}:{}", h, port), format!("http://{}", h)])
            .collect();

        Self { origins }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

/// Create CORS layer. The inspection API is read-only.
pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
}

/// Fallback for unknown routes
pub async fn handle_404(method: Method, uri: axum::http::Uri) -> impl IntoResponse {
    tracing::debug!(%method, %uri, "[404]");
    ApiError::not_found("NOT_FOUND", format!("No route for {} {}", method, uri.path()))
}
