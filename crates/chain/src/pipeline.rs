//! Resolution pipeline: what a link does once its dependency has settled.

use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use wdchain_core_types::{ChainError, ChainErrorKind, ChainResult, Outcome};
use wdchain_event_bus::{ChainEvent, EventBus};

use crate::command::{is_wait_command, tolerates_missing_target, Command, CommandPath, Signature};
use crate::commands::screenshot_descriptor;
use crate::context::CommandContext;
use crate::link::{Continuation, Link, LinkKind, LinkParts, LinkState, Origin, Settlement};
use crate::metrics::ChainCounter;
use crate::surface::{CommandRequest, RequestBody};
use crate::trace;

/// Builds the link for `request` behind `dependency` and spawns its driver
/// task. Fails synchronously for unknown commands and rejected arguments.
pub(crate) fn dispatch(
    dependency: &Link,
    origin: Origin,
    request: CommandRequest,
    sequence: Option<Weak<Mutex<Link>>>,
) -> ChainResult<Link> {
    let core = Arc::clone(dependency.core());
    let CommandRequest {
        path,
        args,
        site,
        body,
    } = request;
    let command = match body {
        RequestBody::Table => core
            .table
            .lookup(&path)
            .ok_or_else(|| ChainError::unknown_command(path.to_string()))?,
        RequestBody::AdHoc(command) => command,
    };
    command.validate(&args)?;
    core.table.freeze();

    let name = path.to_string();
    let trace = trace::record(&core.table, &origin.parent_trace, &name, &origin.caller, site);
    let log_index = core.log.append(name.clone(), args.clone());
    core.metrics.record(ChainCounter::Dispatched);

    let link = Link::pending(
        core,
        LinkParts {
            kind: LinkKind::Command(path),
            args,
            origin,
            trace,
            depends_on: Some(dependency.id().clone()),
            sequence,
        },
    );

    let prior = dependency.settled_future();
    let task_link = link.clone();
    tokio::spawn(async move {
        let prior = prior.await;
        let started = Instant::now();
        let settlement = run_command(&task_link, command, prior).await;
        task_link
            .core()
            .log
            .record_result(log_index, log_value(&settlement));
        info!(
            target: "wdchain::chain",
            link = %task_link.id(),
            command = %name,
            depth = task_link.depth(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = settlement.label(),
            "command settled"
        );
        task_link.complete(settlement);
    });

    Ok(link)
}

async fn run_command(link: &Link, command: Arc<dyn Command>, prior: Settlement) -> Settlement {
    link.set_state(LinkState::Settling);
    let core = link.core();
    let path = match link.path() {
        Some(path) => path.clone(),
        None => return fail(link, ChainError::internal("command link without a name")).await,
    };
    let outcome = match prior {
        Settlement::Resolved(outcome) => outcome,
        Settlement::Deferred(err) | Settlement::Rejected(err) => {
            after_failure(&err, command.signature(), link.args())
        }
    };
    link.set_last_result(outcome.clone());

    let name = path.to_string();
    core.events
        .publish(ChainEvent::Command {
            session: core.id.clone(),
            link: link.id().clone(),
            name: name.clone(),
            args: link.args().to_vec(),
            depth: link.depth(),
        })
        .await;

    if let Outcome::NotFound { selector, reason } = &outcome {
        if !tolerates_missing_target(&path) {
            core.metrics.record(ChainCounter::ShortCircuited);
            debug!(
                target: "wdchain::chain",
                link = %link.id(),
                command = %name,
                selector = %selector,
                "prior target not found, skipping command body"
            );
            let err = ChainError::no_such_element(selector.clone(), reason.clone());
            return fail(link, err).await;
        }
    }

    let args = effective_args(command.signature(), &path, link.args(), &outcome);
    let started = Instant::now();
    let ctx = CommandContext::new(link.clone(), outcome);
    match command.run(ctx, args).await {
        Ok(result) => {
            core.metrics.record(ChainCounter::Resolved);
            core.events
                .publish(ChainEvent::Result {
                    session: core.id.clone(),
                    link: link.id().clone(),
                    name,
                    value: result.value(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
                .await;
            Settlement::Resolved(result)
        }
        Err(err) => fail(link, err).await,
    }
}

fn omits_target(signature: Signature, args: &[Value]) -> bool {
    signature.targeted && args.first().map_or(true, Value::is_null)
}

/// What a command sees when the link before it failed. The failure stays
/// with that link and the body runs on a neutral outcome, unless the
/// failure is a missing element the command would have taken as its
/// target.
fn after_failure(err: &ChainError, signature: Signature, args: &[Value]) -> Outcome {
    match err.kind() {
        ChainErrorKind::NoSuchElement { selector, reason } if omits_target(signature, args) => {
            Outcome::not_found(selector.clone(), reason.clone())
        }
        _ => Outcome::unit(),
    }
}

/// Arguments the body actually receives: an omitted leading target is
/// filled from the prior outcome. Wait commands only get the selector so
/// they always re-resolve.
pub(crate) fn effective_args(
    signature: Signature,
    path: &CommandPath,
    args: &[Value],
    prior: &Outcome,
) -> Vec<Value> {
    let mut args = args.to_vec();
    if !omits_target(signature, &args) {
        return args;
    }
    let injected = match prior {
        Outcome::Target(target) if is_wait_command(path) => Value::String(target.selector.clone()),
        Outcome::Target(target) => target.to_arg(),
        Outcome::NotFound { selector, .. } if tolerates_missing_target(path) => {
            Value::String(selector.clone())
        }
        _ => return args,
    };
    match args.first_mut() {
        Some(first) => *first = injected,
        None => args.push(injected),
    }
    args
}

pub(crate) async fn run_continuation(
    link: &Link,
    continuation: Continuation,
    prior: Settlement,
) -> Settlement {
    link.set_state(LinkState::Settling);
    let Continuation { on_ok, on_err } = continuation;
    match prior {
        Settlement::Resolved(outcome) => {
            link.set_last_result(outcome.clone());
            match on_ok {
                Some(on_ok) => match on_ok(outcome).await {
                    Ok(next) => Settlement::Resolved(next),
                    Err(err) => fail(link, err).await,
                },
                None => Settlement::Resolved(outcome),
            }
        }
        Settlement::Deferred(err) | Settlement::Rejected(err) => match on_err {
            Some(on_err) => match on_err(err).await {
                Ok(next) => Settlement::Resolved(next),
                Err(err) => fail(link, err).await,
            },
            None => fail(link, err).await,
        },
    }
}

/// Failure path of a link: recovery, then hand-back below depth 0, then
/// terminal handling at depth 0.
pub(crate) async fn fail(link: &Link, mut error: ChainError) -> Settlement {
    if error.is_finalized() {
        return if link.depth() == 0 {
            Settlement::Rejected(error)
        } else {
            Settlement::Deferred(error)
        };
    }

    let core = link.core();
    let name = link.label();
    if !error.recovery_attempted() {
        link.set_state(LinkState::Recovering);
        if let Some(value) = core.config.recovery.recover(&error).await {
            core.metrics.record(ChainCounter::Recovered);
            debug!(
                target: "wdchain::chain",
                link = %link.id(),
                command = %name,
                error = %error,
                "failure recovered"
            );
            return Settlement::Resolved(Outcome::Value(value));
        }
        error.mark_recovery_attempted();
    }

    trace::attach(&mut error, link.trace());
    if link.depth() != 0 {
        core.metrics.record(ChainCounter::Deferred);
        debug!(
            target: "wdchain::chain",
            link = %link.id(),
            command = %name,
            depth = link.depth(),
            "failure handed back to enclosing command"
        );
        return Settlement::Deferred(error);
    }

    finalize(link, error).await
}

async fn finalize(link: &Link, mut error: ChainError) -> Settlement {
    let core = link.core();
    let settings = &core.config.settings;
    let name = link.label();

    if settings.orchestrated_mode {
        core.config.recovery.notify_terminal(&error).await;
    }
    if settings.capture_on_failure.enabled() && error.mark_captured() {
        capture(link).await;
    }

    error.mark_finalized();
    core.metrics.record(ChainCounter::Rejected);
    warn!(
        target: "wdchain::chain",
        link = %link.id(),
        command = %name,
        error = %error,
        "command failed"
    );
    core.events
        .publish(ChainEvent::Error {
            session: core.id.clone(),
            link: link.id().clone(),
            name: link.name(),
            message: error.to_string(),
            diagnostic: error.diagnostic(),
        })
        .await;
    Settlement::Rejected(error)
}

/// Best effort: a failing capture is logged and never replaces the failure
/// being finalized.
async fn capture(link: &Link) {
    let core = link.core();
    match core
        .transport
        .submit(&screenshot_descriptor(), Value::Null)
        .await
    {
        Ok(response) => {
            core.events
                .publish(ChainEvent::Screenshot {
                    session: core.id.clone(),
                    link: link.id().clone(),
                    destination: core.config.settings.capture_destination.clone(),
                    payload: response.value,
                })
                .await;
        }
        Err(err) => {
            warn!(
                target: "wdchain::chain",
                link = %link.id(),
                error = %err,
                "diagnostic capture failed"
            );
        }
    }
}

fn log_value(settlement: &Settlement) -> Value {
    match settlement {
        Settlement::Resolved(outcome) => outcome.value(),
        Settlement::Deferred(err) | Settlement::Rejected(err) => json!({ "error": err.to_string() }),
    }
}
