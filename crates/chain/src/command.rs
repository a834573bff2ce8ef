use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use wdchain_core_types::{ChainError, ChainResult, Outcome};

use crate::context::CommandContext;

/// Fully qualified command name: `name` or `namespace.name`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CommandPath {
    namespace: Option<String>,
    name: String,
}

impl CommandPath {
    pub fn new(name: impl Into<String>) -> ChainResult<Self> {
        let name = name.into();
        validate_segment(&name)?;
        Ok(Self {
            namespace: None,
            name,
        })
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> ChainResult<Self> {
        let namespace = namespace.into();
        let name = name.into();
        validate_segment(&namespace)?;
        validate_segment(&name)?;
        Ok(Self {
            namespace: Some(namespace),
            name,
        })
    }

    /// Accepts `name` and `namespace.name`.
    pub fn parse(raw: &str) -> ChainResult<Self> {
        match raw.split_once('.') {
            Some((namespace, name)) => Self::namespaced(namespace, name),
            None => Self::new(raw),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

fn validate_segment(segment: &str) -> ChainResult<()> {
    if segment.trim().is_empty() {
        return Err(ChainError::invalid_argument("command name must not be empty"));
    }
    if segment.contains('.') {
        return Err(ChainError::invalid_argument(format!(
            "command name `{segment}` must not contain '.'"
        )));
    }
    Ok(())
}

/// Declared parameter shape of a command.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Signature {
    /// The first parameter is a target (selector or element reference) and
    /// may be omitted to reuse the previous command's target.
    pub targeted: bool,
}

impl Signature {
    pub const fn plain() -> Self {
        Self { targeted: false }
    }

    pub const fn targeted() -> Self {
        Self { targeted: true }
    }
}

/// A command body. Built-ins and user registrations implement the same trait
/// and run through the same dispatch path.
#[async_trait]
pub trait Command: Send + Sync {
    fn signature(&self) -> Signature {
        Signature::plain()
    }

    /// Synchronous argument check, run before anything is queued.
    fn validate(&self, _args: &[Value]) -> ChainResult<()> {
        Ok(())
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome>;
}

pub struct FnCommand<F, Fut> {
    signature: Signature,
    body: F,
    _marker: PhantomData<fn() -> Fut>,
}

/// Wraps a closure as a [`Command`].
pub fn command_fn<F, Fut>(signature: Signature, body: F) -> FnCommand<F, Fut>
where
    F: Fn(CommandContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
{
    FnCommand {
        signature,
        body,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> Command for FnCommand<F, Fut>
where
    F: Fn(CommandContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
{
    fn signature(&self) -> Signature {
        self.signature
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        (self.body)(ctx, args).await
    }
}

const WAIT_COMMANDS: [&str; 3] = ["waitForExist", "waitForVisible", "waitUntil"];
const PRESENCE_CHECKS: [&str; 2] = ["isExisting", "isVisible"];

fn builtin(path: &CommandPath, names: &[&str]) -> bool {
    path.namespace().is_none() && names.contains(&path.name())
}

/// Built-in wait loops. Namespaced commands never belong to the family,
/// whatever their name.
pub(crate) fn is_wait_command(path: &CommandPath) -> bool {
    builtin(path, &WAIT_COMMANDS)
}

/// Commands that expect to see missing targets and therefore never
/// short-circuit on a prior not-found outcome.
pub(crate) fn tolerates_missing_target(path: &CommandPath) -> bool {
    is_wait_command(path) || builtin(path, &PRESENCE_CHECKS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_parse_and_render() {
        let plain = CommandPath::parse("click").unwrap();
        assert_eq!(plain.to_string(), "click");
        assert!(plain.namespace().is_none());

        let namespaced = CommandPath::parse("forms.fill").unwrap();
        assert_eq!(namespaced.namespace(), Some("forms"));
        assert_eq!(namespaced.name(), "fill");
        assert_eq!(namespaced.to_string(), "forms.fill");
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert!(CommandPath::new("").unwrap_err().is_validation());
        assert!(CommandPath::new("a.b").unwrap_err().is_validation());
        assert!(CommandPath::parse("a.b.c").unwrap_err().is_validation());
    }

    #[test]
    fn command_families() {
        let path = |name: &str| CommandPath::parse(name).unwrap();
        assert!(tolerates_missing_target(&path("waitForExist")));
        assert!(tolerates_missing_target(&path("waitUntil")));
        assert!(tolerates_missing_target(&path("isExisting")));
        assert!(tolerates_missing_target(&path("isVisible")));
        assert!(!tolerates_missing_target(&path("click")));
        assert!(is_wait_command(&path("waitForVisible")));
        assert!(!is_wait_command(&path("isExisting")));
    }

    #[test]
    fn lookalike_user_commands_keep_plain_semantics() {
        let path = |name: &str| CommandPath::parse(name).unwrap();
        assert!(!is_wait_command(&path("forms.waitForSubmit")));
        assert!(!tolerates_missing_target(&path("forms.waitForExist")));
        assert!(!is_wait_command(&path("waitForSubmit")));
        assert!(!tolerates_missing_target(&path("isVisibleWithinViewport")));
    }
}
