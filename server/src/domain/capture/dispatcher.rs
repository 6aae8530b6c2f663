//! Event dispatcher
//!
//! Applies the capture gates, routes the event to the handler registered for
//! its type and hands the result to the sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;

use super::correlation::CorrelationRegistry;
use super::event::{Capture, Event, entry_type};
use super::handlers::CaptureContext;
use super::registry::HandlerRegistry;
use super::sink::{EntrySink, SaveReport, save};

/// Which events are captured at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Capture everything
    pub debug: bool,
    /// Capture errors even when not in debug mode
    pub error_record: bool,
    /// Drop request events for paths no route matched
    pub only_route: bool,
}

impl CaptureSettings {
    pub fn is_enabled(&self) -> bool {
        self.debug || self.error_record
    }

    /// Only `ERROR` events are captured
    pub fn errors_only(&self) -> bool {
        self.error_record && !self.debug
    }
}

pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    sink: Arc<dyn EntrySink>,
    context: CaptureContext,
    settings: CaptureSettings,
    skip: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        sink: Arc<dyn EntrySink>,
        context: CaptureContext,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            registry,
            sink,
            context,
            settings,
            skip: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
    }

    pub fn correlation(&self) -> &Arc<CorrelationRegistry> {
        self.context.correlation()
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Suspend or resume capture process-wide
    pub fn set_skip(&self, skip: bool) {
        self.skip.store(skip, Ordering::Relaxed);
    }

    pub fn is_skipping(&self) -> bool {
        self.skip.load(Ordering::Relaxed)
    }

    /// Gate and transform `event`. `None` means it is not captured.
    pub fn capture(&self, event: &Event) -> Option<Capture> {
        let entry_type = event.entry_type();
        if !self.admits(event, entry_type) {
            return None;
        }

        let Some(handler) = self.registry.get(entry_type) else {
            tracing::trace!(entry_type, "No handler registered");
            return None;
        };

        let mut capture = handler.transform(event, &self.context)?;
        for tag in event.user_tags() {
            capture.push_tag(tag);
        }
        Some(capture)
    }

    /// Capture and persist inline. Returns `None` when nothing was captured.
    pub async fn fire(&self, event: Event) -> Option<SaveReport> {
        let capture = self.capture(&event)?;
        Some(save(self.sink.as_ref(), capture).await)
    }

    /// Capture inline, persist on the current runtime.
    ///
    /// Used from synchronous callbacks. Without a runtime the capture is lost.
    pub fn submit(&self, event: &Event) {
        let Some(capture) = self.capture(event) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = Arc::clone(&self.sink);
                handle.spawn(async move {
                    save(sink.as_ref(), capture).await;
                });
            }
            Err(_) => {
                tracing::trace!(entry_id = %capture.entry.id, "No runtime, capture dropped");
            }
        }
    }

    fn admits(&self, event: &Event, entry_type: &str) -> bool {
        if !self.settings.is_enabled() {
            return false;
        }
        if self.is_skipping() || event.is_skipped() {
            return false;
        }
        if self.settings.only_route
            && entry_type == entry_type::REQUEST
            && event
                .exchange()
                .is_none_or(|exchange| exchange.matched_route.is_none())
        {
            return false;
        }
        if self.settings.errors_only() {
            return event.level == Level::ERROR;
        }
        true
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("skip", &self.is_skipping())
            .finish()
    }
}
