//! Recovery middleware: handlers that get a chance to replace a failure with
//! a value before it is finalized to calling code.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use wdchain_core_types::ChainError;

#[async_trait]
pub trait RecoveryHandler: Send + Sync {
    /// Returning `Some` recovers the chain with that value.
    async fn recover(&self, error: &ChainError) -> Option<Value>;

    /// Called for every handler before a failure is finalized in
    /// orchestrated mode.
    async fn on_terminal(&self, _error: &ChainError) {}
}

#[async_trait]
impl<F> RecoveryHandler for F
where
    F: Fn(&ChainError) -> Option<Value> + Send + Sync,
{
    async fn recover(&self, error: &ChainError) -> Option<Value> {
        (self)(error)
    }
}

/// Handlers in registration order.
#[derive(Clone, Default)]
pub struct RecoveryChain {
    handlers: Vec<Arc<dyn RecoveryHandler>>,
}

impl RecoveryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handler: Arc<dyn RecoveryHandler>) {
        self.handlers.push(handler);
    }

    pub fn with<H>(mut self, handler: H) -> Self
    where
        H: RecoveryHandler + 'static,
    {
        self.push(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// First handler to return a value wins.
    pub async fn recover(&self, error: &ChainError) -> Option<Value> {
        for handler in &self.handlers {
            if let Some(value) = handler.recover(error).await {
                return Some(value);
            }
        }
        None
    }

    pub async fn notify_terminal(&self, error: &ChainError) {
        for handler in &self.handlers {
            handler.on_terminal(error).await;
        }
    }
}

impl fmt::Debug for RecoveryChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryChain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[tokio::test]
    async fn first_defined_value_wins() {
        let chain = RecoveryChain::new()
            .with(|_: &ChainError| -> Option<Value> { None })
            .with(|err: &ChainError| err.is_remote().then(|| json!("fallback")))
            .with(|_: &ChainError| Some(json!("never")));

        let recovered = chain.recover(&ChainError::remote("boom")).await;
        assert_eq!(recovered, Some(json!("fallback")));
    }

    #[tokio::test]
    async fn empty_chain_recovers_nothing() {
        let chain = RecoveryChain::default();
        assert!(chain.recover(&ChainError::remote("boom")).await.is_none());
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl RecoveryHandler for Recorder {
        async fn recover(&self, _error: &ChainError) -> Option<Value> {
            None
        }

        async fn on_terminal(&self, error: &ChainError) {
            self.0.lock().push(error.to_string());
        }
    }

    #[tokio::test]
    async fn terminal_notification_reaches_every_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = RecoveryChain::new()
            .with(Recorder(Arc::clone(&seen)))
            .with(Recorder(Arc::clone(&seen)));

        chain.notify_terminal(&ChainError::remote("boom")).await;
        assert_eq!(*seen.lock(), vec!["boom".to_string(), "boom".to_string()]);
    }
}
