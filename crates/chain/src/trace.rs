//! Command-level trace reconstruction.
//!
//! Each link records the frame of the call that created it. Calls made by
//! calling code start a fresh trace; calls made from inside a command body
//! extend the trace of the command that made them, so a failure deep inside
//! nested commands reads as the chain of commands that led to it.

use wdchain_core_types::{CallSite, Caller, ChainError, Trace, TraceFrame};

use crate::table::CommandTable;

/// Ad-hoc command bodies that are not in the table but still nest.
const AD_HOC: [&str; 2] = ["call", "waitUntil"];

pub(crate) fn record(
    table: &CommandTable,
    parent: &Trace,
    command: &str,
    caller: &Caller,
    site: CallSite,
) -> Trace {
    let frame = TraceFrame::Call {
        command: command.to_string(),
        caller: caller.clone(),
        site,
    };
    match caller {
        Caller::Command(name) if is_command(table, name) => parent.with(frame),
        _ => Trace::single(frame),
    }
}

fn is_command(table: &CommandTable, name: &str) -> bool {
    AD_HOC.contains(&name) || table.contains(name)
}

/// Puts the link's trace on a failure that does not carry a deeper call
/// trace yet. Compacted groups already on the failure stay after the calls.
pub(crate) fn attach(error: &mut ChainError, link_trace: &Trace) {
    if error.trace().has_calls() || link_trace.is_empty() {
        return;
    }
    let mut trace = link_trace.clone();
    trace.extend(error.trace().groups().cloned());
    error.set_trace(trace);
}

/// Collapses a wait loop's polling iterations into one frame.
pub fn compact(label: impl Into<String>, iterations: usize) -> TraceFrame {
    TraceFrame::Group {
        label: label.into(),
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(line: u32) -> CallSite {
        CallSite {
            file: "tests/login.rs",
            line,
            column: 5,
        }
    }

    #[test]
    fn calling_code_resets_and_commands_append() {
        let table = CommandTable::with_builtins();
        let top = record(&table, &Trace::new(), "click", &Caller::CallingCode, site(10));
        assert_eq!(top.len(), 1);

        let nested = record(
            &table,
            &top,
            "element",
            &Caller::Command("click".into()),
            site(20),
        );
        assert_eq!(nested.len(), 2);
        assert_eq!(nested.frames()[1].command(), Some("element"));

        let reset = record(&table, &nested, "getText", &Caller::CallingCode, site(30));
        assert_eq!(reset.len(), 1);
    }

    #[test]
    fn unknown_callers_start_fresh() {
        let table = CommandTable::new();
        let parent = Trace::single(compact("x", 1));
        let trace = record(
            &table,
            &parent,
            "element",
            &Caller::Command("unregistered".into()),
            site(1),
        );
        assert_eq!(trace.len(), 1);

        let trace = record(&table, &parent, "element", &Caller::Command("call".into()), site(1));
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn attach_keeps_deeper_traces_and_groups() {
        let table = CommandTable::with_builtins();
        let link_trace = record(&table, &Trace::new(), "waitForExist", &Caller::CallingCode, site(3));

        let mut timeout = ChainError::wait_timeout("still not existing", 500)
            .with_trace(Trace::single(compact("waitForExist", 6)));
        attach(&mut timeout, &link_trace);
        assert_eq!(timeout.trace().len(), 2);
        assert!(timeout.trace().frames()[0].is_call());
        assert_eq!(timeout.trace().groups().count(), 1);

        let deeper = link_trace.with(TraceFrame::Call {
            command: "element".into(),
            caller: Caller::Command("waitForExist".into()),
            site: site(4),
        });
        let mut nested = ChainError::remote("boom").with_trace(deeper.clone());
        attach(&mut nested, &link_trace);
        assert_eq!(nested.trace(), &deeper);
    }
}
