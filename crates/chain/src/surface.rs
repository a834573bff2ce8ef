//! The chainable command surface shared by sessions, links and command
//! contexts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wdchain_core_types::{CallSite, ChainError, ChainResult, Outcome, TargetRef};

use crate::command::{Command, CommandPath};
use crate::commands::adhoc::{CallCommand, WaitUntilCommand};
use crate::context::CommandContext;
use crate::link::Link;

/// Leading argument of a targeted command.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Target {
    /// Omitted: reuse the target the previous command resolved.
    #[default]
    Implicit,
    Selector(String),
    Ref(TargetRef),
}

impl Target {
    pub fn into_arg(self) -> Value {
        match self {
            Target::Implicit => Value::Null,
            Target::Selector(selector) => Value::String(selector),
            Target::Ref(target) => target.to_arg(),
        }
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Target::Selector(value.to_string())
    }
}

impl From<String> for Target {
    fn from(value: String) -> Self {
        Target::Selector(value)
    }
}

impl From<TargetRef> for Target {
    fn from(value: TargetRef) -> Self {
        Target::Ref(value)
    }
}

impl From<&TargetRef> for Target {
    fn from(value: &TargetRef) -> Self {
        Target::Ref(value.clone())
    }
}

impl From<Option<Target>> for Target {
    fn from(value: Option<Target>) -> Self {
        value.unwrap_or_default()
    }
}

pub enum RequestBody {
    /// Look the command up in the session's table.
    Table,
    /// A one-off body that is not registered anywhere.
    AdHoc(Arc<dyn Command>),
}

/// One command call, as handed to [`ChainSurface::enqueue`].
pub struct CommandRequest {
    pub path: CommandPath,
    pub args: Vec<Value>,
    pub site: CallSite,
    pub body: RequestBody,
}

impl CommandRequest {
    pub fn table(path: CommandPath, args: Vec<Value>, site: CallSite) -> Self {
        Self {
            path,
            args,
            site,
            body: RequestBody::Table,
        }
    }

    pub fn ad_hoc(
        name: &str,
        command: Arc<dyn Command>,
        args: Vec<Value>,
        site: CallSite,
    ) -> ChainResult<Self> {
        Ok(Self {
            path: CommandPath::new(name)?,
            args,
            site,
            body: RequestBody::AdHoc(command),
        })
    }
}

/// Every command call goes through [`ChainSurface::enqueue`]; the provided
/// methods only build requests. Built-ins and registered commands take the
/// same path.
pub trait ChainSurface {
    /// Queues `request` behind the current end of this surface's sequence.
    /// Unknown commands and rejected arguments fail here, before anything is
    /// queued.
    fn enqueue(&self, request: CommandRequest) -> ChainResult<Link>;

    /// Already rejected link for a failure raised before queueing.
    fn reject(&self, error: ChainError) -> Link;

    #[track_caller]
    fn try_command(&self, name: &str, args: Vec<Value>) -> ChainResult<Link> {
        let site = CallSite::caller();
        self.enqueue(CommandRequest::table(CommandPath::parse(name)?, args, site))
    }

    #[track_caller]
    fn try_command_in(&self, namespace: &str, name: &str, args: Vec<Value>) -> ChainResult<Link> {
        let site = CallSite::caller();
        self.enqueue(CommandRequest::table(
            CommandPath::namespaced(namespace, name)?,
            args,
            site,
        ))
    }

    /// Like [`ChainSurface::try_command`], with synchronous failures turned
    /// into a rejected link.
    #[track_caller]
    fn command(&self, name: &str, args: Vec<Value>) -> Link {
        match self.try_command(name, args) {
            Ok(link) => link,
            Err(err) => self.reject(err),
        }
    }

    #[track_caller]
    fn command_in(&self, namespace: &str, name: &str, args: Vec<Value>) -> Link {
        match self.try_command_in(namespace, name, args) {
            Ok(link) => link,
            Err(err) => self.reject(err),
        }
    }

    #[track_caller]
    fn url(&self, url: &str) -> Link {
        self.command("url", vec![json!(url)])
    }

    #[track_caller]
    fn get_url(&self) -> Link {
        self.command("getUrl", Vec::new())
    }

    #[track_caller]
    fn get_title(&self) -> Link {
        self.command("getTitle", Vec::new())
    }

    #[track_caller]
    fn element(&self, selector: &str) -> Link {
        self.command("element", vec![json!(selector)])
    }

    #[track_caller]
    fn elements(&self, selector: &str) -> Link {
        self.command("elements", vec![json!(selector)])
    }

    #[track_caller]
    fn click(&self, target: impl Into<Target>) -> Link {
        self.command("click", vec![target.into().into_arg()])
    }

    #[track_caller]
    fn get_text(&self, target: impl Into<Target>) -> Link {
        self.command("getText", vec![target.into().into_arg()])
    }

    #[track_caller]
    fn set_value(&self, target: impl Into<Target>, text: &str) -> Link {
        self.command("setValue", vec![target.into().into_arg(), json!(text)])
    }

    #[track_caller]
    fn get_attribute(&self, target: impl Into<Target>, attribute: &str) -> Link {
        self.command(
            "getAttribute",
            vec![target.into().into_arg(), json!(attribute)],
        )
    }

    #[track_caller]
    fn is_existing(&self, target: impl Into<Target>) -> Link {
        self.command("isExisting", vec![target.into().into_arg()])
    }

    #[track_caller]
    fn is_visible(&self, target: impl Into<Target>) -> Link {
        self.command("isVisible", vec![target.into().into_arg()])
    }

    #[track_caller]
    fn wait_for_exist(&self, target: impl Into<Target>, timeout_ms: Option<u64>) -> Link {
        self.command(
            "waitForExist",
            vec![target.into().into_arg(), json!(timeout_ms)],
        )
    }

    #[track_caller]
    fn wait_for_visible(&self, target: impl Into<Target>, timeout_ms: Option<u64>) -> Link {
        self.command(
            "waitForVisible",
            vec![target.into().into_arg(), json!(timeout_ms)],
        )
    }

    #[track_caller]
    fn pause(&self, millis: u64) -> Link {
        self.command("pause", vec![json!(millis)])
    }

    #[track_caller]
    fn screenshot(&self) -> Link {
        self.command("screenshot", Vec::new())
    }

    #[track_caller]
    fn end(&self) -> Link {
        self.command("end", Vec::new())
    }

    /// Queues a one-off body as a command named `call`.
    #[track_caller]
    fn call<F, Fut>(&self, body: F) -> Link
    where
        Self: Sized,
        F: FnOnce(CommandContext) -> Fut + Send + 'static,
        Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
    {
        let site = CallSite::caller();
        let request =
            CommandRequest::ad_hoc("call", Arc::new(CallCommand::new(body)), Vec::new(), site);
        match request.and_then(|request| self.enqueue(request)) {
            Ok(link) => link,
            Err(err) => self.reject(err),
        }
    }

    /// Queues a wait loop over `condition`, named `waitUntil`. `message`
    /// describes the awaited state in the timeout failure.
    #[track_caller]
    fn wait_until<F, Fut>(&self, message: &str, condition: F, timeout: Option<Duration>) -> Link
    where
        Self: Sized,
        F: FnMut(CommandContext) -> Fut + Send + 'static,
        Fut: Future<Output = ChainResult<bool>> + Send + 'static,
    {
        let site = CallSite::caller();
        let timeout_ms = timeout.map(|timeout| timeout.as_millis() as u64);
        let request = CommandRequest::ad_hoc(
            "waitUntil",
            Arc::new(WaitUntilCommand::new(condition)),
            vec![json!(message), json!(timeout_ms)],
            site,
        );
        match request.and_then(|request| self.enqueue(request)) {
            Ok(link) => link,
            Err(err) => self.reject(err),
        }
    }
}
