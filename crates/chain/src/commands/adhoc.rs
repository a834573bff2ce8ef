//! Bodies queued through `call` and `wait_until`. They are not in the table
//! and run exactly once.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use wdchain_core_types::{ChainError, ChainResult, Outcome};

use crate::command::Command;
use crate::context::CommandContext;

pub(crate) struct CallCommand<F> {
    body: Mutex<Option<F>>,
}

impl<F> CallCommand<F> {
    pub(crate) fn new(body: F) -> Self {
        Self {
            body: Mutex::new(Some(body)),
        }
    }
}

#[async_trait]
impl<F, Fut> Command for CallCommand<F>
where
    F: FnOnce(CommandContext) -> Fut + Send + 'static,
    Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
{
    async fn run(&self, ctx: CommandContext, _args: Vec<Value>) -> ChainResult<Outcome> {
        let body = self.body.lock().take();
        match body {
            Some(body) => body(ctx).await,
            None => Err(ChainError::internal("call body already ran")),
        }
    }
}

pub(crate) struct WaitUntilCommand<F> {
    condition: Mutex<Option<F>>,
}

impl<F> WaitUntilCommand<F> {
    pub(crate) fn new(condition: F) -> Self {
        Self {
            condition: Mutex::new(Some(condition)),
        }
    }
}

#[async_trait]
impl<F, Fut> Command for WaitUntilCommand<F>
where
    F: FnMut(CommandContext) -> Fut + Send + 'static,
    Fut: Future<Output = ChainResult<bool>> + Send + 'static,
{
    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let taken = self.condition.lock().take();
        let Some(mut condition) = taken else {
            return Err(ChainError::internal("waitUntil condition already ran"));
        };
        let message = args
            .first()
            .and_then(Value::as_str)
            .unwrap_or("condition")
            .to_string();
        let mut wait = ctx.wait_loop();
        if let Some(timeout_ms) = args.get(1).and_then(Value::as_u64) {
            wait = wait.with_timeout(Duration::from_millis(timeout_ms));
        }
        wait.run("waitUntil", message, || condition(ctx.clone())).await?;
        Ok(Outcome::from(true))
    }
}
