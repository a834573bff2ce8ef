use std::path::PathBuf;

use serde_json::Value;
use wdchain_core_types::{LinkId, SessionId};

/// Lifecycle notifications published by a session. Payloads are opaque to the
/// chain core; it only guarantees when each one fires.
#[derive(Clone, Debug)]
pub enum ChainEvent {
    /// A command link started executing (once per dispatch).
    Command {
        session: SessionId,
        link: LinkId,
        name: String,
        args: Vec<Value>,
        depth: usize,
    },
    /// A command link resolved.
    Result {
        session: SessionId,
        link: LinkId,
        name: String,
        value: Value,
        elapsed_ms: u64,
    },
    /// A failure was finalized to calling code.
    Error {
        session: SessionId,
        link: LinkId,
        name: Option<String>,
        message: String,
        diagnostic: String,
    },
    Screenshot {
        session: SessionId,
        link: LinkId,
        destination: Option<PathBuf>,
        payload: Value,
    },
    End {
        session: SessionId,
    },
}

impl ChainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChainEvent::Command { .. } => "command",
            ChainEvent::Result { .. } => "result",
            ChainEvent::Error { .. } => "error",
            ChainEvent::Screenshot { .. } => "screenshot",
            ChainEvent::End { .. } => "end",
        }
    }

    pub fn session(&self) -> &SessionId {
        match self {
            ChainEvent::Command { session, .. }
            | ChainEvent::Result { session, .. }
            | ChainEvent::Error { session, .. }
            | ChainEvent::Screenshot { session, .. }
            | ChainEvent::End { session } => session,
        }
    }
}
