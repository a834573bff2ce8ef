//! Shared primitives for the wdchain crates: identifiers, the tagged command
//! outcome, the chain error type and the command-level trace frames.

use std::fmt;

use uuid::Uuid;

mod error;
mod outcome;
mod trace;

pub use error::{ChainError, ChainErrorKind, ChainResult};
pub use outcome::{Outcome, TargetRef, ELEMENT_KEY, LEGACY_ELEMENT_KEY};
pub use trace::{CallSite, Caller, Trace, TraceFrame};

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct LinkId(pub String);

impl LinkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
