use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use wdchain_core_types::{ChainError, ChainResult, Outcome, SessionId};
use wdchain_event_bus::{to_mpsc, ChainEvent, EventBus, InMemoryBus};
use wdchain_transport::{NoopTransport, Transport};

use crate::command::{Command, Signature};
use crate::config::{ChainConfig, SessionConfig};
use crate::context::CommandContext;
use crate::link::{Link, Origin, Sequence};
use crate::log::{CommandLog, CommandLogEntry};
use crate::metrics::{ChainMetrics, MetricsSnapshot};
use crate::pipeline;
use crate::recovery::{RecoveryChain, RecoveryHandler};
use crate::surface::{ChainSurface, CommandRequest};
use crate::table::CommandTable;

/// State shared by every link of one session.
pub(crate) struct SessionCore {
    pub(crate) id: SessionId,
    pub(crate) config: Arc<SessionConfig>,
    pub(crate) table: Arc<CommandTable>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) events: Arc<InMemoryBus<ChainEvent>>,
    pub(crate) log: CommandLog,
    pub(crate) metrics: ChainMetrics,
}

/// Entry point for calling code. Commands called on the session queue
/// behind whatever the session ran last.
#[derive(Clone)]
pub struct Session {
    core: Arc<SessionCore>,
    tail: Sequence,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn id(&self) -> &SessionId {
        &self.core.id
    }

    pub fn config(&self) -> &ChainConfig {
        &self.core.config.settings
    }

    pub fn table(&self) -> &CommandTable {
        &self.core.table
    }

    /// Registers a command. Only possible until the first command call.
    pub fn add_command<C>(&self, name: &str, command: C, force: bool) -> ChainResult<()>
    where
        C: Command + 'static,
    {
        self.core.table.register(name, command, force)
    }

    pub fn add_command_in<C>(
        &self,
        namespace: &str,
        name: &str,
        command: C,
        force: bool,
    ) -> ChainResult<()>
    where
        C: Command + 'static,
    {
        self.core.table.register_in(namespace, name, command, force)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.core.events.subscribe()
    }

    /// Session events as a bounded stream; needs a running runtime.
    pub fn event_stream(&self, capacity: usize) -> mpsc::Receiver<ChainEvent> {
        to_mpsc(Arc::clone(&self.core.events), capacity)
    }

    pub fn events(&self) -> Arc<InMemoryBus<ChainEvent>> {
        Arc::clone(&self.core.events)
    }

    pub fn command_log(&self) -> Vec<CommandLogEntry> {
        self.core.log.snapshot()
    }

    /// Link counters of this session, nested links included.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    /// Current end of the session's sequence.
    pub fn tail(&self) -> Link {
        self.tail.lock().clone()
    }
}

impl ChainSurface for Session {
    fn enqueue(&self, request: CommandRequest) -> ChainResult<Link> {
        let mut tail = self.tail.lock();
        let next = pipeline::dispatch(
            &tail,
            Origin::calling_code(),
            request,
            Some(Arc::downgrade(&self.tail)),
        )?;
        *tail = next.clone();
        Ok(next)
    }

    fn reject(&self, error: ChainError) -> Link {
        Link::rejected(
            Arc::clone(&self.core),
            Origin::calling_code(),
            error,
            Some(Arc::downgrade(&self.tail)),
        )
    }
}

/// Closed build step: configuration, transport, recovery handlers and
/// extra commands are fixed here, before any command is queued.
pub struct SessionBuilder {
    id: Option<SessionId>,
    settings: ChainConfig,
    recovery: RecoveryChain,
    transport: Arc<dyn Transport>,
    table: CommandTable,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            id: None,
            settings: ChainConfig::default(),
            recovery: RecoveryChain::default(),
            transport: Arc::new(NoopTransport),
            table: CommandTable::with_builtins(),
        }
    }
}

impl SessionBuilder {
    pub fn with_config(mut self, settings: ChainConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_session_id(mut self, id: SessionId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_transport<T>(mut self, transport: Arc<T>) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = transport;
        self
    }

    pub fn with_recovery<H>(mut self, handler: H) -> Self
    where
        H: RecoveryHandler + 'static,
    {
        self.recovery.push(Arc::new(handler));
        self
    }

    /// Replaces the built-in table, e.g. with an empty one.
    pub fn with_table(mut self, table: CommandTable) -> Self {
        self.table = table;
        self
    }

    pub fn register<C>(self, name: &str, command: C) -> ChainResult<Self>
    where
        C: Command + 'static,
    {
        self.table.register(name, command, false)?;
        Ok(self)
    }

    pub fn register_in<C>(self, namespace: &str, name: &str, command: C) -> ChainResult<Self>
    where
        C: Command + 'static,
    {
        self.table.register_in(namespace, name, command, false)?;
        Ok(self)
    }

    pub fn register_fn<F, Fut>(self, name: &str, signature: Signature, body: F) -> ChainResult<Self>
    where
        F: Fn(CommandContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
    {
        self.table.register_fn(name, signature, body, false)?;
        Ok(self)
    }

    pub fn build(self) -> Session {
        let events = InMemoryBus::new(self.settings.event_capacity);
        let config = SessionConfig::new(self.settings).with_recovery(self.recovery);
        let core = Arc::new(SessionCore {
            id: self.id.unwrap_or_default(),
            config: Arc::new(config),
            table: Arc::new(self.table),
            transport: self.transport,
            events,
            log: CommandLog::new(),
            metrics: ChainMetrics::default(),
        });
        let root = Link::root(Arc::clone(&core), Outcome::unit(), Origin::calling_code());
        Session {
            core,
            tail: Arc::new(Mutex::new(root)),
        }
    }
}
