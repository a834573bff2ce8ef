use async_trait::async_trait;
use serde_json::{json, Value};
use wdchain_core_types::{ChainError, ChainResult, Outcome, TargetRef};
use wdchain_transport::CommandDescriptor;

use super::{element_path, find_strategy, resolve_target, selector_of, string_arg, validate_target};
use crate::command::{Command, Signature};
use crate::context::CommandContext;

const FIND_ELEMENT: &str = "/session/:sessionId/element";
const FIND_ELEMENTS: &str = "/session/:sessionId/elements";

fn locator(selector: &str) -> Value {
    let (using, value) = find_strategy(selector);
    json!({ "using": using, "value": value })
}

async fn find_all(ctx: &CommandContext, selector: &str) -> ChainResult<Vec<TargetRef>> {
    let found = ctx
        .submit(CommandDescriptor::post(FIND_ELEMENTS), locator(selector))
        .await?;
    Ok(found
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| TargetRef::from_driver(selector, item))
                .collect()
        })
        .unwrap_or_default())
}

/// Finds one element. A driver "no such element" answer resolves to a
/// not-found outcome rather than a failure, so the next command decides
/// whether that is fatal.
pub struct Element;

#[async_trait]
impl Command for Element {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_target("element", args)
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let selector = match args.first() {
            Some(Value::String(selector)) => selector.clone(),
            other => return resolve_target(&ctx, other).await.map(Outcome::Target),
        };
        match ctx
            .submit_raw(&CommandDescriptor::post(FIND_ELEMENT), locator(&selector))
            .await
        {
            Ok(response) => TargetRef::from_driver(&selector, &response.value)
                .map(Outcome::Target)
                .ok_or_else(|| {
                    ChainError::remote(format!(
                        "driver returned no element reference for \"{selector}\""
                    ))
                }),
            Err(err) if err.is_no_such_element() => Ok(Outcome::not_found(selector, err.to_string())),
            Err(err) => Err(ChainError::remote(format!("POST {FIND_ELEMENT}: {err}"))),
        }
    }
}

pub struct Elements;

#[async_trait]
impl Command for Elements {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_target("elements", args)
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let selector = selector_of(args.first())?;
        let found = find_all(&ctx, &selector).await?;
        Ok(Outcome::Value(Value::Array(
            found.iter().map(TargetRef::to_arg).collect(),
        )))
    }
}

/// Clicks the target and resolves to it, so further commands can reuse it.
pub struct Click;

#[async_trait]
impl Command for Click {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_target("click", args)
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let target = resolve_target(&ctx, args.first()).await?;
        ctx.submit(
            CommandDescriptor::post(element_path(&target, "click")),
            json!({}),
        )
        .await?;
        Ok(Outcome::Target(target))
    }
}

pub struct GetText;

#[async_trait]
impl Command for GetText {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_target("getText", args)
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let target = resolve_target(&ctx, args.first()).await?;
        let text = ctx
            .submit(CommandDescriptor::get(element_path(&target, "text")), Value::Null)
            .await?;
        Ok(Outcome::Value(text))
    }
}

/// Clears the field, then types the text. Resolves to the target.
pub struct SetValue;

#[async_trait]
impl Command for SetValue {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_target("setValue", args)?;
        string_arg("setValue", args, 1).map(|_| ())
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let text = string_arg("setValue", &args, 1)?.to_string();
        let target = resolve_target(&ctx, args.first()).await?;
        ctx.submit(
            CommandDescriptor::post(element_path(&target, "clear")),
            json!({}),
        )
        .await?;
        ctx.submit(
            CommandDescriptor::post(element_path(&target, "value")),
            json!({ "text": text }),
        )
        .await?;
        Ok(Outcome::Target(target))
    }
}

pub struct GetAttribute;

#[async_trait]
impl Command for GetAttribute {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_target("getAttribute", args)?;
        string_arg("getAttribute", args, 1).map(|_| ())
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let attribute = string_arg("getAttribute", &args, 1)?.to_string();
        let target = resolve_target(&ctx, args.first()).await?;
        let value = ctx
            .submit(
                CommandDescriptor::get(element_path(&target, &format!("attribute/{attribute}"))),
                Value::Null,
            )
            .await?;
        Ok(Outcome::Value(value))
    }
}

/// Re-queries the selector; never fails because the element is missing.
pub struct IsExisting;

#[async_trait]
impl Command for IsExisting {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_target("isExisting", args)
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let selector = selector_of(args.first())?;
        let found = find_all(&ctx, &selector).await?;
        Ok(Outcome::from(!found.is_empty()))
    }
}

pub struct IsVisible;

#[async_trait]
impl Command for IsVisible {
    fn signature(&self) -> Signature {
        Signature::targeted()
    }

    fn validate(&self, args: &[Value]) -> ChainResult<()> {
        validate_target("isVisible", args)
    }

    async fn run(&self, ctx: CommandContext, args: Vec<Value>) -> ChainResult<Outcome> {
        let selector = selector_of(args.first())?;
        let found = find_all(&ctx, &selector).await?;
        let Some(first) = found.first() else {
            return Ok(Outcome::from(false));
        };
        let displayed = ctx
            .submit(CommandDescriptor::get(element_path(first, "displayed")), Value::Null)
            .await?;
        Ok(Outcome::from(displayed.as_bool().unwrap_or(false)))
    }
}
