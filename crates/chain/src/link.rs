//! Chain links: one node per queued command or continuation.
//!
//! A link owns a settlement controller that fires exactly once and a shared
//! future over that settlement, so any number of followers observe the same
//! value. Followers are driven by spawned tasks that first await the link
//! they depend on; that await is what gives each sequence its total order.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use wdchain_core_types::{Caller, ChainError, ChainResult, LinkId, Outcome, Trace};

use crate::command::CommandPath;
use crate::pipeline;
use crate::session::SessionCore;
use crate::surface::{ChainSurface, CommandRequest};
use crate::unify::{unify_outcome, UnifyOptions};

/// Terminal value of a link.
#[derive(Clone, Debug)]
pub enum Settlement {
    Resolved(Outcome),
    /// Failure handed back to the enclosing command instead of being
    /// finalized. Only produced below depth 0.
    Deferred(ChainError),
    Rejected(ChainError),
}

impl Settlement {
    pub fn into_result(self) -> ChainResult<Outcome> {
        match self {
            Settlement::Resolved(outcome) => Ok(outcome),
            Settlement::Deferred(err) | Settlement::Rejected(err) => Err(err),
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Settlement::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ChainError> {
        match self {
            Settlement::Deferred(err) | Settlement::Rejected(err) => Some(err),
            Settlement::Resolved(_) => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Settlement::Deferred(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settlement::Rejected(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Settlement::Resolved(_) => "resolved",
            Settlement::Deferred(_) => "deferred",
            Settlement::Rejected(_) => "rejected",
        }
    }
}

pub(crate) type SettledFuture = Shared<BoxFuture<'static, Settlement>>;

pub(crate) struct SettlementController {
    sender: Mutex<Option<oneshot::Sender<Settlement>>>,
}

impl SettlementController {
    pub(crate) fn channel() -> (Self, SettledFuture) {
        let (tx, rx) = oneshot::channel();
        let settled = rx
            .map(|received| {
                received.unwrap_or_else(|_| {
                    Settlement::Rejected(ChainError::internal("link dropped before settling"))
                })
            })
            .boxed()
            .shared();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            settled,
        )
    }

    /// Returns `false` for every call after the first.
    pub(crate) fn settle(&self, settlement: Settlement) -> bool {
        match self.sender.lock().take() {
            Some(tx) => {
                let _ = tx.send(settlement);
                true
            }
            None => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Pending,
    Settling,
    Recovering,
    Resolved,
    Rejected,
}

#[derive(Clone, Debug)]
pub(crate) enum LinkKind {
    Root,
    Command(CommandPath),
    Continuation,
}

/// Who queues through a link: nesting depth, caller identity and the trace
/// nested calls extend.
#[derive(Clone, Debug)]
pub(crate) struct Origin {
    pub depth: usize,
    pub caller: Caller,
    pub parent_trace: Trace,
}

impl Origin {
    pub(crate) fn calling_code() -> Self {
        Self {
            depth: 0,
            caller: Caller::CallingCode,
            parent_trace: Trace::new(),
        }
    }
}

/// The slot holding the most recent link of a sequence.
pub(crate) type Sequence = Arc<Mutex<Link>>;

pub(crate) struct LinkInner {
    id: LinkId,
    core: Arc<SessionCore>,
    kind: LinkKind,
    args: Vec<Value>,
    origin: Origin,
    trace: Trace,
    depends_on: Option<LinkId>,
    state: Mutex<LinkState>,
    last_result: Mutex<Option<Outcome>>,
    controller: SettlementController,
    settled: SettledFuture,
    sequence: Option<Weak<Mutex<Link>>>,
}

/// Handle to one link. Cloning is cheap and every clone observes the same
/// settlement.
#[derive(Clone)]
pub struct Link {
    inner: Arc<LinkInner>,
}

pub(crate) struct LinkParts {
    pub kind: LinkKind,
    pub args: Vec<Value>,
    pub origin: Origin,
    pub trace: Trace,
    pub depends_on: Option<LinkId>,
    pub sequence: Option<Weak<Mutex<Link>>>,
}

impl Link {
    pub(crate) fn pending(core: Arc<SessionCore>, parts: LinkParts) -> Self {
        let (controller, settled) = SettlementController::channel();
        Self {
            inner: Arc::new(LinkInner {
                id: LinkId::new(),
                core,
                kind: parts.kind,
                args: parts.args,
                origin: parts.origin,
                trace: parts.trace,
                depends_on: parts.depends_on,
                state: Mutex::new(LinkState::Pending),
                last_result: Mutex::new(None),
                controller,
                settled,
                sequence: parts.sequence,
            }),
        }
    }

    /// Already resolved starting point of a sequence.
    pub(crate) fn root(core: Arc<SessionCore>, outcome: Outcome, origin: Origin) -> Self {
        let link = Self::pending(
            core,
            LinkParts {
                kind: LinkKind::Root,
                args: Vec::new(),
                trace: origin.parent_trace.clone(),
                origin,
                depends_on: None,
                sequence: None,
            },
        );
        link.complete(Settlement::Resolved(outcome));
        link
    }

    /// A link that failed before it could be queued. At depth 0 the failure
    /// is final; below it goes back to the enclosing command like any other
    /// nested failure.
    pub(crate) fn rejected(
        core: Arc<SessionCore>,
        origin: Origin,
        mut error: ChainError,
        sequence: Option<Weak<Mutex<Link>>>,
    ) -> Self {
        let settlement = if origin.depth == 0 {
            error.mark_finalized();
            Settlement::Rejected(error)
        } else {
            Settlement::Deferred(error)
        };
        let link = Self::pending(
            core,
            LinkParts {
                kind: LinkKind::Continuation,
                args: Vec::new(),
                trace: Trace::new(),
                origin,
                depends_on: None,
                sequence,
            },
        );
        link.complete(settlement);
        link
    }

    /// Settles the link. Only the first call takes effect; the state lock is
    /// held across the settlement so woken observers see the final state.
    pub(crate) fn complete(&self, settlement: Settlement) -> bool {
        let next = match settlement {
            Settlement::Rejected(_) => LinkState::Rejected,
            _ => LinkState::Resolved,
        };
        let mut state = self.inner.state.lock();
        let settled = self.inner.controller.settle(settlement);
        if settled {
            *state = next;
        }
        settled
    }

    pub(crate) fn set_state(&self, state: LinkState) {
        *self.inner.state.lock() = state;
    }

    pub(crate) fn set_last_result(&self, outcome: Outcome) {
        *self.inner.last_result.lock() = Some(outcome);
    }

    pub(crate) fn core(&self) -> &Arc<SessionCore> {
        &self.inner.core
    }

    pub(crate) fn origin(&self) -> &Origin {
        &self.inner.origin
    }

    pub(crate) fn settled_future(&self) -> SettledFuture {
        self.inner.settled.clone()
    }

    /// Makes `next` the current end of the sequence this link belongs to.
    pub(crate) fn advance(&self, next: &Link) {
        if let Some(sequence) = self.inner.sequence.as_ref().and_then(Weak::upgrade) {
            *sequence.lock() = next.clone();
        }
    }

    pub(crate) fn sequence(&self) -> Option<Weak<Mutex<Link>>> {
        self.inner.sequence.clone()
    }

    pub fn id(&self) -> &LinkId {
        &self.inner.id
    }

    pub fn path(&self) -> Option<&CommandPath> {
        match &self.inner.kind {
            LinkKind::Command(path) => Some(path),
            _ => None,
        }
    }

    /// Qualified command name; `None` for continuations.
    pub fn name(&self) -> Option<String> {
        self.path().map(ToString::to_string)
    }

    pub(crate) fn label(&self) -> String {
        match &self.inner.kind {
            LinkKind::Command(path) => path.to_string(),
            LinkKind::Continuation => "continuation".into(),
            LinkKind::Root => "root".into(),
        }
    }

    pub fn args(&self) -> &[Value] {
        &self.inner.args
    }

    pub fn depth(&self) -> usize {
        self.inner.origin.depth
    }

    pub fn state(&self) -> LinkState {
        *self.inner.state.lock()
    }

    pub fn trace(&self) -> &Trace {
        &self.inner.trace
    }

    /// Outcome of the dependency, once it has settled successfully.
    pub fn last_result(&self) -> Option<Outcome> {
        self.inner.last_result.lock().clone()
    }

    pub fn ptr_eq(&self, other: &Link) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The raw settlement, including the deferred hand-back case.
    pub fn settled(&self) -> impl Future<Output = Settlement> + Send + 'static {
        self.settled_future()
    }

    pub fn inspect(&self) -> LinkSnapshot {
        let settlement = self.inner.settled.peek().cloned();
        LinkSnapshot {
            id: self.inner.id.to_string(),
            name: self.name(),
            args: self.inner.args.clone(),
            depth: self.depth(),
            state: self.state(),
            depends_on: self.inner.depends_on.as_ref().map(ToString::to_string),
            trace: self.inner.trace.to_string(),
            last_result: self.last_result().map(|outcome| outcome.value()),
            result: settlement
                .as_ref()
                .and_then(Settlement::outcome)
                .map(Outcome::value),
            error: settlement
                .as_ref()
                .and_then(Settlement::failure)
                .map(ToString::to_string),
        }
    }

    /// Registers success and failure callbacks. An empty continuation
    /// returns this same link.
    pub fn then_with(&self, continuation: Continuation) -> Link {
        if continuation.is_empty() {
            return self.clone();
        }
        self.follow(move |link, prior| async move {
            pipeline::run_continuation(&link, continuation, prior).await
        })
    }

    pub fn then<F, Fut>(&self, on_ok: F) -> Link
    where
        F: FnOnce(Outcome) -> Fut + Send + 'static,
        Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
    {
        self.then_with(Continuation::new().on_ok(on_ok))
    }

    pub fn catch<G, Fut>(&self, on_err: G) -> Link
    where
        G: FnOnce(ChainError) -> Fut + Send + 'static,
        Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
    {
        self.then_with(Continuation::new().on_err(on_err))
    }

    pub fn then_or_else<F, FutOk, G, FutErr>(&self, on_ok: F, on_err: G) -> Link
    where
        F: FnOnce(Outcome) -> FutOk + Send + 'static,
        FutOk: Future<Output = ChainResult<Outcome>> + Send + 'static,
        G: FnOnce(ChainError) -> FutErr + Send + 'static,
        FutErr: Future<Output = ChainResult<Outcome>> + Send + 'static,
    {
        self.then_with(Continuation::new().on_ok(on_ok).on_err(on_err))
    }

    /// Runs `side_effect` once this link settles and passes the settlement
    /// through unchanged.
    pub fn finally<F, Fut>(&self, side_effect: F) -> Link
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.follow(move |_link, prior| async move {
            side_effect().await;
            prior
        })
    }

    /// Normalizes this link's value, see [`crate::unify_values`].
    pub fn unify(&self, options: UnifyOptions) -> Link {
        self.then(move |outcome| async move {
            Ok(Outcome::Value(unify_outcome(&outcome, &options)))
        })
    }

    fn follow<F, Fut>(&self, run: F) -> Link
    where
        F: FnOnce(Link, Settlement) -> Fut + Send + 'static,
        Fut: Future<Output = Settlement> + Send + 'static,
    {
        let link = Link::pending(
            Arc::clone(self.core()),
            LinkParts {
                kind: LinkKind::Continuation,
                args: Vec::new(),
                origin: self.inner.origin.clone(),
                trace: self.inner.trace.clone(),
                depends_on: Some(self.inner.id.clone()),
                sequence: self.sequence(),
            },
        );
        let dependency = self.settled_future();
        let task_link = link.clone();
        tokio::spawn(async move {
            let prior = dependency.await;
            let settlement = run(task_link.clone(), prior).await;
            task_link.complete(settlement);
        });
        self.advance(&link);
        link
    }
}

impl ChainSurface for Link {
    fn enqueue(&self, request: CommandRequest) -> ChainResult<Link> {
        let next = pipeline::dispatch(self, self.origin().clone(), request, self.sequence())?;
        self.advance(&next);
        Ok(next)
    }

    fn reject(&self, error: ChainError) -> Link {
        Link::rejected(
            Arc::clone(self.core()),
            self.origin().clone(),
            error,
            self.sequence(),
        )
    }
}

impl IntoFuture for Link {
    type Output = ChainResult<Outcome>;
    type IntoFuture = BoxFuture<'static, ChainResult<Outcome>>;

    fn into_future(self) -> Self::IntoFuture {
        let settled = self.settled_future();
        async move { settled.await.into_result() }.boxed()
    }
}

impl IntoFuture for &Link {
    type Output = ChainResult<Outcome>;
    type IntoFuture = BoxFuture<'static, ChainResult<Outcome>>;

    fn into_future(self) -> Self::IntoFuture {
        self.clone().into_future()
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.inner.id)
            .field("name", &self.label())
            .field("depth", &self.depth())
            .field("state", &self.state())
            .finish()
    }
}

/// Inspection view of a link.
#[derive(Clone, Debug, Serialize)]
pub struct LinkSnapshot {
    pub id: String,
    pub name: Option<String>,
    pub args: Vec<Value>,
    pub depth: usize,
    pub state: LinkState,
    pub depends_on: Option<String>,
    pub trace: String,
    pub last_result: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

type OnOk = Box<dyn FnOnce(Outcome) -> BoxFuture<'static, ChainResult<Outcome>> + Send>;
type OnErr = Box<dyn FnOnce(ChainError) -> BoxFuture<'static, ChainResult<Outcome>> + Send>;

/// Success and failure callbacks for [`Link::then_with`].
#[derive(Default)]
pub struct Continuation {
    pub(crate) on_ok: Option<OnOk>,
    pub(crate) on_err: Option<OnErr>,
}

impl Continuation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_ok<F, Fut>(mut self, on_ok: F) -> Self
    where
        F: FnOnce(Outcome) -> Fut + Send + 'static,
        Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
    {
        self.on_ok = Some(Box::new(move |outcome| on_ok(outcome).boxed()));
        self
    }

    pub fn on_err<G, Fut>(mut self, on_err: G) -> Self
    where
        G: FnOnce(ChainError) -> Fut + Send + 'static,
        Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
    {
        self.on_err = Some(Box::new(move |error| on_err(error).boxed()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.on_ok.is_none() && self.on_err.is_none()
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("on_ok", &self.on_ok.is_some())
            .field("on_err", &self.on_err.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn controller_settles_once() {
        let (controller, settled) = SettlementController::channel();
        assert!(controller.settle(Settlement::Resolved(Outcome::from("first"))));
        assert!(!controller.settle(Settlement::Resolved(Outcome::from("second"))));

        let (a, b) = tokio::join!(settled.clone(), settled);
        assert_eq!(a.outcome(), Some(&Outcome::from("first")));
        assert_eq!(b.outcome(), Some(&Outcome::from("first")));
    }

    #[tokio::test]
    async fn dropped_controller_rejects() {
        let (controller, settled) = SettlementController::channel();
        drop(controller);
        assert!(settled.await.is_rejected());
    }

    #[tokio::test]
    async fn late_completion_leaves_the_link_untouched() {
        let link = crate::session::Session::builder().build().tail();
        assert_eq!(link.inspect().state, LinkState::Resolved);

        assert!(!link.complete(Settlement::Rejected(ChainError::remote("late"))));
        assert_eq!(link.inspect().state, LinkState::Resolved);
        assert!(matches!(link.settled().await, Settlement::Resolved(_)));
    }

    #[test]
    fn settlement_results() {
        let deferred = Settlement::Deferred(ChainError::remote("boom"));
        assert!(deferred.is_deferred());
        assert_eq!(deferred.label(), "deferred");
        assert!(deferred.into_result().unwrap_err().is_remote());
        assert!(Continuation::default().is_empty());
    }
}
