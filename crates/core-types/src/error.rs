use thiserror::Error;

use crate::trace::Trace;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ChainErrorKind {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("command `{0}` is already registered")]
    DuplicateCommand(String),
    #[error("namespace `{0}` collides with an existing command")]
    NamespaceCollision(String),
    #[error("command table is frozen; register commands before the first command call")]
    TableFrozen,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("{0}")]
    Remote(String),
    #[error("no such element: an element could not be located using selector \"{selector}\" ({reason})")]
    NoSuchElement { selector: String, reason: String },
    #[error("{message} (timed out after {timeout_ms}ms)")]
    WaitTimeout { message: String, timeout_ms: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure travelling through a chain. Carries the command-level trace and the
/// one-shot markers the resolution pipeline uses to avoid handling the same
/// failure twice.
#[derive(Debug, Error, Clone)]
#[error("{kind}")]
pub struct ChainError {
    kind: ChainErrorKind,
    trace: Trace,
    recovery_attempted: bool,
    captured: bool,
    finalized: bool,
}

pub type ChainResult<T> = Result<T, ChainError>;

impl ChainError {
    pub fn new(kind: ChainErrorKind) -> Self {
        Self {
            kind,
            trace: Trace::default(),
            recovery_attempted: false,
            captured: false,
            finalized: false,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ChainErrorKind::InvalidArgument(message.into()))
    }

    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::new(ChainErrorKind::UnknownCommand(name.into()))
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ChainErrorKind::Remote(message.into()))
    }

    pub fn no_such_element(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ChainErrorKind::NoSuchElement {
            selector: selector.into(),
            reason: reason.into(),
        })
    }

    pub fn wait_timeout(message: impl Into<String>, timeout_ms: u64) -> Self {
        Self::new(ChainErrorKind::WaitTimeout {
            message: message.into(),
            timeout_ms,
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ChainErrorKind::Internal(message.into()))
    }

    pub fn kind(&self) -> &ChainErrorKind {
        &self.kind
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut Trace {
        &mut self.trace
    }

    pub fn set_trace(&mut self, trace: Trace) {
        self.trace = trace;
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = trace;
        self
    }

    /// Selector of the element a not-found failure was looking for.
    pub fn selector(&self) -> Option<&str> {
        match &self.kind {
            ChainErrorKind::NoSuchElement { selector, .. } => Some(selector),
            _ => None,
        }
    }

    /// Synchronous failures raised before anything is queued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind,
            ChainErrorKind::InvalidArgument(_)
                | ChainErrorKind::DuplicateCommand(_)
                | ChainErrorKind::NamespaceCollision(_)
                | ChainErrorKind::TableFrozen
                | ChainErrorKind::UnknownCommand(_)
        )
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.kind, ChainErrorKind::Remote(_))
    }

    pub fn is_no_such_element(&self) -> bool {
        matches!(self.kind, ChainErrorKind::NoSuchElement { .. })
    }

    pub fn is_wait_timeout(&self) -> bool {
        matches!(self.kind, ChainErrorKind::WaitTimeout { .. })
    }

    pub fn recovery_attempted(&self) -> bool {
        self.recovery_attempted
    }

    pub fn mark_recovery_attempted(&mut self) {
        self.recovery_attempted = true;
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Sets the diagnostic-capture marker. Returns `true` only for the call
    /// that flipped it.
    pub fn mark_captured(&mut self) -> bool {
        !std::mem::replace(&mut self.captured, true)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn mark_finalized(&mut self) {
        self.recovery_attempted = true;
        self.finalized = true;
    }

    /// Human readable failure text: the message followed by the command trace.
    pub fn diagnostic(&self) -> String {
        if self.trace.is_empty() {
            format!("Error: {}", self.kind)
        } else {
            format!("Error: {}\n{}", self.kind, self.trace)
        }
    }
}

impl From<ChainErrorKind> for ChainError {
    fn from(kind: ChainErrorKind) -> Self {
        Self::new(kind)
    }
}
