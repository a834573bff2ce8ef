use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use wdchain_core_types::{ChainError, ChainResult, Outcome};
use wdchain_event_bus::ChainEvent;
use wdchain_transport::CommandDescriptor;

use super::screenshot_descriptor;
use crate::command::Command;
use crate::context::CommandContext;

pub struct Pause;

#[async_trait]
impl Command for Pause {
    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        match args.first() {
            Some(value) if value.as_u64().is_some() => Ok(()),
            _ => Err(ChainError::invalid_argument(
                "pause: expected a duration in milliseconds",
            )),
        }
    }

    async fn run(&self, _ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let millis = args.first().and_then(Value::as_u64).unwrap_or_default();
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(Outcome::unit())
    }
}

/// Takes a screenshot and hands the payload to event subscribers. Writing
/// it anywhere is their job.
pub struct Screenshot;

#[async_trait]
impl Command for Screenshot {
    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let payload = ctx.submit(screenshot_descriptor(), Value::Null).await?;
        let destination = args
            .first()
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .or_else(|| ctx.config().capture_destination.clone());
        ctx.publish(ChainEvent::Screenshot {
            session: ctx.session_id().clone(),
            link: ctx.link().id().clone(),
            destination,
            payload: payload.clone(),
        })
        .await;
        Ok(Outcome::Value(payload))
    }
}

pub struct End;

#[async_trait]
impl Command for End {
    async fn run(&self, ctx: CommandContext, _args: Vec<Value>) -> ChainResult<Outcome> {
        ctx.submit(CommandDescriptor::delete("/session/:sessionId"), Value::Null)
            .await?;
        ctx.publish(ChainEvent::End {
            session: ctx.session_id().clone(),
        })
        .await;
        Ok(Outcome::unit())
    }
}
