use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url as ParsedUrl;
use wdchain_core_types::{ChainError, ChainResult, Outcome};
use wdchain_transport::CommandDescriptor;

use crate::command::Command;
use crate::context::CommandContext;

const URL: &str = "/session/:sessionId/url";
const TITLE: &str = "/session/:sessionId/title";

/// Navigates when given a URL, otherwise reads the current one.
pub struct Url;

#[async_trait]
impl Command for Url {
    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        match args.first() {
            None | Some(Value::Null) => Ok(()),
            Some(Value::String(url)) if !url.trim().is_empty() => Ok(()),
            Some(other) => Err(ChainError::invalid_argument(format!(
                "url: expected a non-empty string, got {other}"
            ))),
        }
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let Some(raw) = args.first().and_then(Value::as_str) else {
            let current = ctx.submit(CommandDescriptor::get(URL), Value::Null).await?;
            return Ok(Outcome::Value(current));
        };
        let target = resolve_url(ctx.config().base_url.as_deref(), raw)?;
        ctx.submit(CommandDescriptor::post(URL), json!({ "url": target.as_str() }))
            .await?;
        Ok(Outcome::unit())
    }
}

fn resolve_url(base: Option<&str>, raw: &str) -> ChainResult<ParsedUrl> {
    match ParsedUrl::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                ChainError::invalid_argument(format!("relative url `{raw}` needs base_url"))
            })?;
            ParsedUrl::parse(base)
                .and_then(|base| base.join(raw))
                .map_err(|err| ChainError::invalid_argument(format!("invalid url `{raw}`: {err}")))
        }
        Err(err) => Err(ChainError::invalid_argument(format!(
            "invalid url `{raw}`: {err}"
        ))),
    }
}

pub struct GetUrl;

#[async_trait]
impl Command for GetUrl {
    async fn run(&self, ctx: CommandContext, _args: Vec<Value>) -> ChainResult<Outcome> {
        let current = ctx.submit(CommandDescriptor::get(URL), Value::Null).await?;
        Ok(Outcome::Value(current))
    }
}

pub struct GetTitle;

#[async_trait]
impl Command for GetTitle {
    async fn run(&self, ctx: CommandContext, _args: Vec<Value>) -> ChainResult<Outcome> {
        let title = ctx.submit(CommandDescriptor::get(TITLE), Value::Null).await?;
        Ok(Outcome::Value(title))
    }
}
