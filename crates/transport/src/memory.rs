//! In-process transport that answers from a route table.
//!
//! Used by tests and dry runs: routes are keyed by method and the path
//! template (with `:sessionId` left in place), every call is recorded with
//! its resolved path, and a start/finish journal exposes execution order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use wdchain_core_types::SessionId;

use crate::{CommandDescriptor, Method, Response, Transport, TransportError, TransportResult};

type Handler = Arc<dyn Fn(&Value) -> TransportResult<Value> + Send + Sync>;

#[derive(Clone)]
struct Route {
    handler: Handler,
    delay: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalEntry {
    Started(String),
    Finished(String),
}

pub struct ScriptedTransport {
    session: SessionId,
    routes: DashMap<(Method, String), Route>,
    calls: Mutex<Vec<RecordedCall>>,
    journal: Mutex<Vec<JournalEntry>>,
}

impl ScriptedTransport {
    pub fn new(session: SessionId) -> Arc<Self> {
        Arc::new(Self {
            session,
            routes: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
        })
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn on<F>(&self, method: Method, path: &str, handler: F) -> &Self
    where
        F: Fn(&Value) -> TransportResult<Value> + Send + Sync + 'static,
    {
        let key = (method, path.to_string());
        let delay = self.routes.get(&key).and_then(|route| route.delay);
        self.routes.insert(
            key,
            Route {
                handler: Arc::new(handler),
                delay,
            },
        );
        self
    }

    pub fn respond(&self, method: Method, path: &str, value: Value) -> &Self {
        self.on(method, path, move |_| Ok(value.clone()))
    }

    pub fn fail(&self, method: Method, path: &str, error: TransportError) -> &Self {
        self.on(method, path, move |_| Err(error.clone()))
    }

    /// Delays the answer of an existing or future route.
    pub fn delay(&self, method: Method, path: &str, delay: Duration) -> &Self {
        let key = (method, path.to_string());
        match self.routes.get_mut(&key) {
            Some(mut route) => route.delay = Some(delay),
            None => {
                self.routes.insert(
                    key,
                    Route {
                        handler: Arc::new(|_| Ok(Value::Null)),
                        delay: Some(delay),
                    },
                );
            }
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Calls recorded for a path template.
    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        let resolved = CommandDescriptor::new(method, path).resolve(&self.session);
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method && call.path == resolved)
            .cloned()
            .collect()
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn submit(
        &self,
        descriptor: &CommandDescriptor,
        body: Value,
    ) -> TransportResult<Response> {
        let resolved = descriptor.resolve(&self.session);
        let label = format!("{} {}", descriptor.method, resolved);
        self.calls.lock().push(RecordedCall {
            method: descriptor.method,
            path: resolved,
            body: body.clone(),
        });
        self.journal.lock().push(JournalEntry::Started(label.clone()));

        let route = self
            .routes
            .get(&(descriptor.method, descriptor.path.clone()))
            .map(|route| route.value().clone());
        let outcome = match route {
            Some(route) => {
                if let Some(delay) = route.delay {
                    tokio::time::sleep(delay).await;
                }
                (route.handler)(&body)
            }
            None => Err(TransportError::Protocol {
                status: 404,
                message: "unknown command".into(),
            }),
        };

        debug!(target: "wdchain::transport", call = %label, ok = outcome.is_ok(), "scripted call");
        self.journal.lock().push(JournalEntry::Finished(label));
        outcome.map(|value| Response {
            value,
            session_id: Some(self.session.0.clone()),
            status: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport() -> Arc<ScriptedTransport> {
        ScriptedTransport::new(SessionId("s-1".into()))
    }

    #[tokio::test]
    async fn routes_answer_and_calls_are_recorded() {
        let transport = transport();
        transport.respond(Method::Get, "/session/:sessionId/title", json!("Example"));

        let response = transport
            .submit(&CommandDescriptor::get("/session/:sessionId/title"), Value::Null)
            .await
            .unwrap();

        assert_eq!(response.value, json!("Example"));
        let calls = transport.calls_to(Method::Get, "/session/:sessionId/title");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/session/s-1/title");
    }

    #[tokio::test]
    async fn unknown_routes_are_protocol_errors() {
        let transport = transport();
        let err = transport
            .submit(&CommandDescriptor::post("/session/:sessionId/nope"), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Protocol { status: 404, .. }));
    }

    #[tokio::test]
    async fn scripted_failures_are_returned() {
        let transport = transport();
        transport.fail(
            Method::Post,
            "/session/:sessionId/element",
            TransportError::NoSuchElement("#missing".into()),
        );
        let err = transport
            .submit(
                &CommandDescriptor::post("/session/:sessionId/element"),
                json!({ "using": "css selector", "value": "#missing" }),
            )
            .await
            .unwrap_err();
        assert!(err.is_no_such_element());
    }

    #[tokio::test]
    async fn delay_is_kept_when_handler_is_replaced() {
        let transport = transport();
        transport
            .delay(Method::Get, "/session/:sessionId/url", Duration::from_millis(5))
            .respond(Method::Get, "/session/:sessionId/url", json!("https://example.com"));

        let response = transport
            .submit(&CommandDescriptor::get("/session/:sessionId/url"), Value::Null)
            .await
            .unwrap();
        assert_eq!(response.value, json!("https://example.com"));
        assert_eq!(
            transport.journal(),
            vec![
                JournalEntry::Started("GET /session/s-1/url".into()),
                JournalEntry::Finished("GET /session/s-1/url".into()),
            ]
        );
    }
}
