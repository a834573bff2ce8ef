//! Contract between the chain core and the remote automation driver.
//!
//! The core never talks to the network itself. Every command body hands a
//! [`CommandDescriptor`] and a JSON body to a [`Transport`] and gets back an
//! eventual [`Response`] or [`TransportError`]. Retry and backoff belong to
//! the transport implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wdchain_core_types::ChainError;

mod descriptor;
mod error;
pub mod memory;

pub use descriptor::{CommandDescriptor, Method, SESSION_PLACEHOLDER};
pub use error::{TransportError, TransportResult};
pub use memory::ScriptedTransport;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub value: Value,
    #[serde(default, rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: u16,
}

impl Response {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            session_id: None,
            status: 0,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues one driver call. The transport substitutes the session
    /// placeholder in the descriptor path.
    async fn submit(&self, descriptor: &CommandDescriptor, body: Value)
        -> TransportResult<Response>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    async fn submit(
        &self,
        descriptor: &CommandDescriptor,
        _body: Value,
    ) -> TransportResult<Response> {
        Err(TransportError::Unavailable(format!(
            "no transport configured for {descriptor}"
        )))
    }
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn submit(
        &self,
        descriptor: &CommandDescriptor,
        body: Value,
    ) -> TransportResult<Response> {
        (**self).submit(descriptor, body).await
    }
}

impl From<TransportError> for ChainError {
    fn from(value: TransportError) -> Self {
        ChainError::remote(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn noop_transport_names_the_call() {
        let err = NoopTransport
            .submit(&CommandDescriptor::get("/session/:sessionId/title"), Value::Null)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GET /session/:sessionId/title"));
    }

    #[test]
    fn response_parses_wire_shape() {
        let response: Response =
            serde_json::from_value(json!({ "value": "Example", "sessionId": "abc" })).unwrap();
        assert_eq!(response.value, "Example");
        assert_eq!(response.session_id.as_deref(), Some("abc"));
        assert_eq!(response.status, 0);
    }

    #[test]
    fn transport_errors_become_remote_chain_errors() {
        let err: ChainError = TransportError::Timeout(500).into();
        assert!(err.is_remote());
    }
}
