use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use wdchain_core_types::{Caller, ChainError, ChainResult, Outcome, SessionId};
use wdchain_event_bus::{ChainEvent, EventBus};
use wdchain_transport::{CommandDescriptor, Response, Transport, TransportResult};

use crate::config::ChainConfig;
use crate::link::{Link, Origin, Sequence};
use crate::pipeline;
use crate::surface::{ChainSurface, CommandRequest};
use crate::wait::WaitLoop;

/// Handle a command body runs with.
///
/// Commands called through the context are nested: they are queued one
/// behind the other on the context's own sequence, run one level deeper
/// than the executing command and extend its trace. Their unrecovered
/// failures come back to the body as errors instead of being finalized.
#[derive(Clone)]
pub struct CommandContext {
    link: Link,
    prior: Outcome,
    cursor: Sequence,
}

impl CommandContext {
    pub(crate) fn new(link: Link, prior: Outcome) -> Self {
        let origin = Self::nested_origin(&link);
        let root = Link::root(Arc::clone(link.core()), prior.clone(), origin);
        Self {
            link,
            prior,
            cursor: Arc::new(Mutex::new(root)),
        }
    }

    fn nested_origin(link: &Link) -> Origin {
        Origin {
            depth: link.depth() + 1,
            caller: Caller::Command(link.label()),
            parent_trace: link.trace().clone(),
        }
    }

    /// Outcome of the command this one was chained after.
    pub fn prior(&self) -> &Outcome {
        &self.prior
    }

    pub fn depth(&self) -> usize {
        self.link.depth()
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn session_id(&self) -> &SessionId {
        &self.link.core().id
    }

    pub fn config(&self) -> &ChainConfig {
        &self.link.core().config.settings
    }

    pub fn wait_loop(&self) -> WaitLoop {
        WaitLoop::from_config(&self.config().wait)
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.link.core().transport)
    }

    /// Driver call with transport failures mapped to remote chain errors.
    pub async fn submit(&self, descriptor: CommandDescriptor, body: Value) -> ChainResult<Value> {
        self.submit_raw(&descriptor, body)
            .await
            .map(|response| response.value)
            .map_err(|err| ChainError::remote(format!("{descriptor}: {err}")))
    }

    pub async fn submit_raw(
        &self,
        descriptor: &CommandDescriptor,
        body: Value,
    ) -> TransportResult<Response> {
        debug!(
            target: "wdchain::transport",
            link = %self.link.id(),
            call = %descriptor,
            "submitting driver call"
        );
        self.link.core().transport.submit(descriptor, body).await
    }

    pub async fn publish(&self, event: ChainEvent) -> usize {
        self.link.core().events.publish(event).await
    }
}

impl ChainSurface for CommandContext {
    fn enqueue(&self, request: CommandRequest) -> ChainResult<Link> {
        let mut cursor = self.cursor.lock();
        let next = pipeline::dispatch(
            &cursor,
            Self::nested_origin(&self.link),
            request,
            Some(Arc::downgrade(&self.cursor)),
        )?;
        *cursor = next.clone();
        Ok(next)
    }

    fn reject(&self, error: ChainError) -> Link {
        Link::rejected(
            Arc::clone(self.link.core()),
            Self::nested_origin(&self.link),
            error,
            Some(Arc::downgrade(&self.cursor)),
        )
    }
}
