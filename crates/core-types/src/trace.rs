use std::fmt;
use std::panic::Location;

/// Source location of a command call in calling code or in a command body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl CallSite {
    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    /// Location of the nearest caller that is not itself `#[track_caller]`.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Identity of whoever invoked a command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Caller {
    CallingCode,
    Command(String),
}

impl Caller {
    pub fn is_command(&self) -> bool {
        matches!(self, Caller::Command(_))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TraceFrame {
    Call {
        command: String,
        caller: Caller,
        site: CallSite,
    },
    /// Many polling iterations of a wait loop collapsed into one frame.
    Group { label: String, iterations: usize },
}

impl TraceFrame {
    pub fn is_call(&self) -> bool {
        matches!(self, TraceFrame::Call { .. })
    }

    pub fn command(&self) -> Option<&str> {
        match self {
            TraceFrame::Call { command, .. } => Some(command),
            TraceFrame::Group { .. } => None,
        }
    }
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceFrame::Call { command, site, .. } => write!(f, "    at {command} ({site})"),
            TraceFrame::Group { label, iterations } => {
                write!(f, "    at {label} [{iterations} polling iterations]")
            }
        }
    }
}

/// Command-level trace, most recent frame last.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Trace {
    frames: Vec<TraceFrame>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(frame: TraceFrame) -> Self {
        Self {
            frames: vec![frame],
        }
    }

    /// Copy of this trace with `frame` appended.
    pub fn with(&self, frame: TraceFrame) -> Self {
        let mut next = self.clone();
        next.push(frame);
        next
    }

    pub fn push(&mut self, frame: TraceFrame) {
        self.frames.push(frame);
    }

    pub fn extend<I>(&mut self, frames: I)
    where
        I: IntoIterator<Item = TraceFrame>,
    {
        self.frames.extend(frames);
    }

    pub fn frames(&self) -> &[TraceFrame] {
        &self.frames
    }

    pub fn has_calls(&self) -> bool {
        self.frames.iter().any(TraceFrame::is_call)
    }

    pub fn groups(&self) -> impl Iterator<Item = &TraceFrame> {
        self.frames.iter().filter(|frame| !frame.is_call())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, frame) in self.frames.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{frame}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(command: &str, line: u32) -> TraceFrame {
        TraceFrame::Call {
            command: command.to_string(),
            caller: Caller::CallingCode,
            site: CallSite {
                file: "tests/login.rs",
                line,
                column: 5,
            },
        }
    }

    #[test]
    fn renders_most_recent_frame_last() {
        let trace = Trace::single(call("click", 10)).with(call("element", 42));
        let rendered = trace.to_string();
        assert_eq!(
            rendered,
            "    at click (tests/login.rs:10:5)\n    at element (tests/login.rs:42:5)"
        );
    }

    #[test]
    fn groups_are_not_calls() {
        let mut trace = Trace::single(call("waitForExist", 3));
        trace.push(TraceFrame::Group {
            label: "waitForExist".into(),
            iterations: 12,
        });
        assert_eq!(trace.groups().count(), 1);
        assert!(trace.to_string().ends_with("[12 polling iterations]"));
    }

    #[test]
    fn caller_site_points_here() {
        let site = CallSite::caller();
        assert!(site.file.ends_with("trace.rs"));
        assert!(site.line > 0);
    }
}
