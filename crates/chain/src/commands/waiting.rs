use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use wdchain_core_types::{ChainError, ChainResult, Outcome};

use super::{selector_of, validate_target};
use crate::command::{Command, Signature};
use crate::context::CommandContext;
use crate::link::Link;
use crate::surface::ChainSurface;

/// Arguments shared by the wait-for family: target, optional timeout in
/// milliseconds, optional reverse flag.
fn validate_wait(command: &str, args: &[Value]) -> ChainResult<()> {
    validate_target(command, args)?;
    match args.get(1) {
        None | Some(Value::Null) => {}
        Some(value) if value.as_u64().is_some() => {}
        Some(other) => {
            return Err(ChainError::invalid_argument(format!(
                "{command}: timeout must be milliseconds, got {other}"
            )))
        }
    }
    match args.get(2) {
        None | Some(Value::Null) | Some(Value::Bool(_)) => Ok(()),
        Some(other) => Err(ChainError::invalid_argument(format!(
            "{command}: reverse must be a boolean, got {other}"
        ))),
    }
}

/// Polls `check` on a fresh nested call each iteration until it returns
/// `!reverse`.
async fn wait_for<F>(
    ctx: &CommandContext,
    label: &str,
    state: &str,
    args: &[Value],
    check: F,
) -> ChainResult<Outcome>
where
    F: Fn(&CommandContext, &str) -> Link,
{
    let selector = selector_of(args.first())?;
    let reverse = args.get(2).and_then(Value::as_bool).unwrap_or(false);
    let mut wait = ctx.wait_loop();
    if let Some(timeout_ms) = args.get(1).and_then(Value::as_u64) {
        wait = wait.with_timeout(Duration::from_millis(timeout_ms));
    }
    let message = format!(
        "element (\"{selector}\") still {}{state} after {}ms",
        if reverse { "" } else { "not " },
        wait.timeout.as_millis()
    );

    wait.run(label, message, || {
        let pending = check(ctx, &selector);
        async move {
            let outcome = pending.await?;
            Ok(outcome.as_bool().unwrap_or(false) != reverse)
        }
    })
    .await?;
    Ok(Outcome::from(true))
}

pub struct WaitForExist;

#[async_trait]
impl Command for WaitForExist {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_wait("waitForExist", args)
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        wait_for(&ctx, "waitForExist", "existing", &args, |ctx, selector| {
            ctx.is_existing(selector)
        })
        .await
    }
}

pub struct WaitForVisible;

#[async_trait]
impl Command for WaitForVisible {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_wait("waitForVisible", args)
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        wait_for(&ctx, "waitForVisible", "visible", &args, |ctx, selector| {
            ctx.is_visible(selector)
        })
        .await
    }
}
