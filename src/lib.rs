//! wdchain library
//!
//! Ordered command chains over a remote automation session. The heavy lifting
//! lives in the member crates; this facade re-exports them under one name.

pub use wdchain_chain as chain;
pub use wdchain_core_types as core_types;
pub use wdchain_event_bus as event_bus;
pub use wdchain_transport as transport;

pub use wdchain_chain::{
    load_config, ChainConfig, ChainSurface, Link, Session, SessionBuilder, SessionConfig,
    Settlement, Target,
};
pub use wdchain_core_types::{ChainError, ChainErrorKind, ChainResult, Outcome, TargetRef};

/// Everything a typical chain script needs in scope.
pub mod prelude {
    pub use serde_json::{json, Value};
    pub use wdchain_chain::{
        command_fn, CaptureOnFailure, ChainConfig, ChainSurface, Command, CommandContext,
        CommandPath, Continuation, Link, RecoveryHandler, Session, SessionConfig, Signature,
        Target, UnifyOptions, WaitConfig,
    };
    pub use wdchain_core_types::{
        ChainError, ChainErrorKind, ChainResult, Outcome, SessionId, TargetRef,
    };
    pub use wdchain_event_bus::{ChainEvent, EventBus};
    pub use wdchain_transport::{Method, ScriptedTransport, Transport, TransportError};
}
