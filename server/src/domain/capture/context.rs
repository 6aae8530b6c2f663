//! Ambient execution context
//!
//! Each unit of work (an inbound request, a job run, a console command) runs
//! inside a tokio task-local [`UnitContext`]. The context owns the unit id used
//! for correlation and carries whatever the handlers need later: the in-flight
//! HTTP exchange, stashed job data, and the skip mark set for excluded paths.
//!
//! Code running outside any scope falls back to a unit id derived from the
//! current thread identity.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::http::Uri;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::attribution::parse_unit_header;
use super::response::CapturedResponse;

/// Identity of one execution unit
pub type UnitId = u64;

/// Scoped unit ids start above any plausible thread id so the two never collide
const SCOPED_UNIT_BASE: UnitId = 1 << 40;

static NEXT_UNIT: AtomicU64 = AtomicU64::new(SCOPED_UNIT_BASE);

tokio::task_local! {
    static CURRENT: Arc<UnitContext>;
}

/// The HTTP exchange in flight for a request unit
#[derive(Debug)]
pub struct Exchange {
    pub method: String,
    pub uri: String,
    pub client_ip: String,
    /// Header name to array of values
    pub headers: Map<String, Value>,
    /// Route template the router matched (`/users/{id}`)
    pub matched_route: Option<String>,
    /// Decoded fields when the request was form encoded
    pub form: Option<Map<String, Value>>,
    /// Raw request body, when it was small enough to buffer
    pub body: Option<Bytes>,
    pub started: Instant,
    pub response: Arc<CapturedResponse>,
}

impl Exchange {
    pub fn new(
        method: impl Into<String>,
        uri: impl Into<String>,
        response: Arc<CapturedResponse>,
    ) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            client_ip: String::new(),
            headers: Map::new(),
            matched_route: None,
            form: None,
            body: None,
            started: Instant::now(),
            response,
        }
    }

    /// Path component of the request URI
    pub fn path(&self) -> String {
        match self.uri.parse::<Uri>() {
            Ok(uri) => uri.path().to_string(),
            Err(_) => self.uri.split('?').next().unwrap_or_default().to_string(),
        }
    }

    /// Time from request entry to response completion (or now, if still streaming)
    pub fn elapsed(&self) -> Duration {
        self.response
            .completed_at()
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started)
    }
}

/// State shared by everything running inside one execution unit
#[derive(Debug)]
pub struct UnitContext {
    unit: UnitId,
    skipped: AtomicBool,
    exchange: Option<Exchange>,
    job: Mutex<Option<Map<String, Value>>>,
}

impl Default for UnitContext {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitContext {
    /// A fresh unit with no exchange attached
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A request unit carrying its HTTP exchange
    pub fn for_exchange(exchange: Exchange) -> Self {
        Self::build(Some(exchange))
    }

    /// A unit whose events are never captured
    pub fn skipped() -> Self {
        let ctx = Self::build(None);
        ctx.mark_skipped();
        ctx
    }

    fn build(exchange: Option<Exchange>) -> Self {
        Self {
            unit: NEXT_UNIT.fetch_add(1, Ordering::Relaxed),
            skipped: AtomicBool::new(false),
            exchange,
            job: Mutex::new(None),
        }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn exchange(&self) -> Option<&Exchange> {
        self.exchange.as_ref()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn mark_skipped(&self) {
        self.skipped.store(true, Ordering::Relaxed);
    }

    /// Replace the job payload read by the `job` handler
    pub fn stash_job(&self, content: Map<String, Value>) {
        *self.job.lock() = Some(content);
    }

    pub fn job_content(&self) -> Option<Map<String, Value>> {
        self.job.lock().clone()
    }
}

/// Context of the current scope, if any
pub fn current() -> Option<Arc<UnitContext>> {
    CURRENT.try_with(Arc::clone).ok()
}

/// Unit id of the caller: the scoped unit, else the thread identity
pub fn current_unit() -> UnitId {
    CURRENT
        .try_with(|ctx| ctx.unit())
        .unwrap_or_else(|_| thread_unit())
}

/// Unit id recovered from the `Debug` rendering of the current thread id
pub fn thread_unit() -> UnitId {
    let identity = format!("{:?}", std::thread::current().id());
    parse_unit_header(&identity, "ThreadId(", ')')
}

/// Run `fut` with `ctx` as the ambient context
pub async fn scope<F: Future>(ctx: Arc<UnitContext>, fut: F) -> F::Output {
    CURRENT.scope(ctx, fut).await
}

/// Run `f` synchronously with `ctx` as the ambient context
pub fn sync_scope<R>(ctx: Arc<UnitContext>, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(ctx, f)
}

/// Stash job data on the current unit. Returns false outside any scope.
pub fn stash_job(content: Map<String, Value>) -> bool {
    match current() {
        Some(ctx) => {
            ctx.stash_job(content);
            true
        }
        None => false,
    }
}
