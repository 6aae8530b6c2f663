use serde_json::{Map, Value, json};

use super::CaptureContext;
use crate::domain::capture::event::{Capture, Event, entry_type};
use crate::domain::capture::registry::TypeHandler;

/// Completed HTTP exchanges. Needs the exchange on the event's unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestHandler;

impl TypeHandler for RequestHandler {
    fn entry_type(&self) -> &str {
        entry_type::REQUEST
    }

    fn transform(&self, event: &Event, ctx: &CaptureContext) -> Option<Capture> {
        let exchange = event.exchange()?;
        let captured = &exchange.response;

        let body = captured.body();
        let response = match serde_json::from_slice::<Map<String, Value>>(&body) {
            Ok(object) if !object.is_empty() => Value::Object(object),
            _ => Value::String(String::from_utf8_lossy(&body).into_owned()),
        };

        let payload = match &exchange.form {
            Some(form) => form.clone(),
            None => exchange
                .body
                .as_ref()
                .and_then(|raw| serde_json::from_slice::<Map<String, Value>>(raw).ok())
                .unwrap_or_default(),
        };

        let uri = if event.message.is_empty() {
            exchange.uri.clone()
        } else {
            event.message.clone()
        };

        let content = json!({
            "ip_address": exchange.client_ip,
            "uri": uri,
            "method": exchange.method,
            "headers": exchange.headers,
            "payload": payload,
            "response_status": captured.status(),
            "response": response,
            "duration": exchange.elapsed().as_millis() as u64,
            "memory": captured.size(),
            "hostname": ctx.hostname(),
        });

        let tag = exchange
            .matched_route
            .clone()
            .unwrap_or_else(|| exchange.path());

        Some(Capture::new(ctx.entry(event, self.entry_type(), content)).tag(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use bytes::Bytes;
    use tracing::Level;

    use crate::domain::capture::context::{Exchange, UnitContext};
    use crate::domain::capture::response::CapturedResponse;

    fn request_event(exchange: Exchange) -> Event {
        let uri = exchange.uri.clone();
        Event::new(Level::INFO, uri)
            .with_type("request")
            .with_context(Arc::new(UnitContext::for_exchange(exchange)))
    }

    #[test]
    fn test_json_exchange() {
        let ctx = CaptureContext::for_tests();
        let captured = Arc::new(CapturedResponse::new(1024));
        captured.set_status(201);
        captured.record(br#"{"id":42}"#);

        let mut exchange = Exchange::new("POST", "/users?src=web", captured.clone());
        exchange.client_ip = "10.0.0.9".to_string();
        exchange.matched_route = Some("/users".to_string());
        exchange.body = Some(Bytes::from_static(br#"{"name":"ada"}"#));
        exchange.started = Instant::now()
            .checked_sub(Duration::from_millis(15))
            .unwrap_or_else(Instant::now);
        captured.mark_complete();

        let capture = RequestHandler.transform(&request_event(exchange), &ctx).unwrap();
        let content = capture.entry.content_json();
        assert_eq!(content["ip_address"], "10.0.0.9");
        assert_eq!(content["uri"], "/users?src=web");
        assert_eq!(content["method"], "POST");
        assert_eq!(content["payload"]["name"], "ada");
        assert_eq!(content["response_status"], 201);
        assert_eq!(content["response"]["id"], 42);
        assert_eq!(content["memory"], 9);
        assert!(content["duration"].as_u64().unwrap() >= 15);
        assert_eq!(capture.tags, vec!["/users"]);
    }

    #[test]
    fn test_text_response_and_path_tag() {
        let ctx = CaptureContext::for_tests();
        let captured = Arc::new(CapturedResponse::new(1024));
        captured.record(b"plain text");

        let exchange = Exchange::new("GET", "/about?x=1", captured);
        let capture = RequestHandler.transform(&request_event(exchange), &ctx).unwrap();
        let content = capture.entry.content_json();
        assert_eq!(content["response"], "plain text");
        assert_eq!(content["response_status"], 200);
        assert_eq!(content["payload"], serde_json::json!({}));
        assert_eq!(capture.tags, vec!["/about"]);
    }

    #[test]
    fn test_empty_json_object_is_kept_as_text() {
        let ctx = CaptureContext::for_tests();
        let captured = Arc::new(CapturedResponse::new(1024));
        captured.record(b"{}");
        let exchange = Exchange::new("GET", "/empty", captured);
        let capture = RequestHandler.transform(&request_event(exchange), &ctx).unwrap();
        assert_eq!(capture.entry.content_json()["response"], "{}");
    }

    #[test]
    fn test_form_payload_wins() {
        let ctx = CaptureContext::for_tests();
        let mut exchange = Exchange::new("POST", "/login", Arc::new(CapturedResponse::new(64)));
        let mut form = Map::new();
        form.insert("user".to_string(), json!("ada"));
        exchange.form = Some(form);
        exchange.body = Some(Bytes::from_static(b"user=ada"));

        let capture = RequestHandler.transform(&request_event(exchange), &ctx).unwrap();
        assert_eq!(capture.entry.content_json()["payload"], json!({"user": "ada"}));
    }

    #[test]
    fn test_without_exchange_is_dropped() {
        let ctx = CaptureContext::for_tests();
        let event = Event::new(Level::INFO, "/x").with_type("request");
        assert!(RequestHandler.transform(&event, &ctx).is_none());
    }
}
