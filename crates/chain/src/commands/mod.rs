//! Built-in commands. They are registered in the table like any user
//! command and go through the same dispatch path.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use wdchain_core_types::{ChainError, ChainResult, Outcome, TargetRef};
use wdchain_transport::CommandDescriptor;

use crate::command::Command;
use crate::context::CommandContext;
use crate::surface::ChainSurface;
use crate::table::CommandTable;

pub(crate) mod adhoc;
mod element;
mod navigation;
mod session;
mod waiting;

pub use element::{Click, Element, Elements, GetAttribute, GetText, IsExisting, IsVisible, SetValue};
pub use navigation::{GetTitle, GetUrl, Url};
pub use session::{End, Pause, Screenshot};
pub use waiting::{WaitForExist, WaitForVisible};

pub(crate) fn install(table: &CommandTable) {
    let add = |name: &str, command: Arc<dyn Command>| {
        if let Err(err) = table.register_arc(name, command, true) {
            warn!(target: "wdchain::chain", command = name, error = %err, "built-in not installed");
        }
    };
    add("url", Arc::new(Url));
    add("getUrl", Arc::new(GetUrl));
    add("getTitle", Arc::new(GetTitle));
    add("element", Arc::new(Element));
    add("elements", Arc::new(Elements));
    add("click", Arc::new(Click));
    add("getText", Arc::new(GetText));
    add("setValue", Arc::new(SetValue));
    add("getAttribute", Arc::new(GetAttribute));
    add("isExisting", Arc::new(IsExisting));
    add("isVisible", Arc::new(IsVisible));
    add("waitForExist", Arc::new(WaitForExist));
    add("waitForVisible", Arc::new(WaitForVisible));
    add("pause", Arc::new(Pause));
    add("screenshot", Arc::new(Screenshot));
    add("end", Arc::new(End));
}

pub(crate) fn screenshot_descriptor() -> CommandDescriptor {
    CommandDescriptor::get("/session/:sessionId/screenshot")
}

pub(crate) fn element_path(target: &TargetRef, suffix: &str) -> String {
    format!("/session/:sessionId/element/{}/{}", target.handle, suffix)
}

/// Locator strategy for a selector string.
pub fn find_strategy(selector: &str) -> (&'static str, &str) {
    if let Some(text) = selector.strip_prefix("*=") {
        ("partial link text", text)
    } else if let Some(text) = selector.strip_prefix('=') {
        ("link text", text)
    } else if selector.starts_with('/') || selector.starts_with('(') || selector.starts_with("./") {
        ("xpath", selector)
    } else {
        ("css selector", selector)
    }
}

/// Turns a target argument into an element reference. Selector strings are
/// resolved through a nested `element` call.
pub(crate) async fn resolve_target(ctx: &CommandContext, arg: Option<&Value>) -> ChainResult<TargetRef> {
    match arg {
        Some(Value::String(selector)) => match ctx.element(selector).await? {
            Outcome::Target(target) => Ok(target),
            Outcome::NotFound { selector, reason } => Err(ChainError::no_such_element(selector, reason)),
            Outcome::Value(other) => Err(ChainError::internal(format!(
                "element lookup returned {other}"
            ))),
        },
        Some(Value::Null) | None => Err(ChainError::invalid_argument(
            "no target: pass a selector or chain after a command that resolves one",
        )),
        Some(value) => TargetRef::from_arg(value).ok_or_else(|| {
            ChainError::invalid_argument(format!("expected a selector or element reference, got {value}"))
        }),
    }
}

/// Selector to re-query: strings as is, element references by the selector
/// that found them.
pub(crate) fn selector_of(arg: Option<&Value>) -> ChainResult<String> {
    match arg {
        Some(Value::String(selector)) if !selector.is_empty() => Ok(selector.clone()),
        Some(value) => TargetRef::from_arg(value)
            .map(|target| target.selector)
            .filter(|selector| !selector.is_empty())
            .ok_or_else(|| ChainError::invalid_argument("expected a selector")),
        None => Err(ChainError::invalid_argument("expected a selector")),
    }
}

/// Accepts an omitted target (`null`, filled in at run time), a selector
/// string or an element reference.
pub(crate) fn validate_target(command: &str, args: &[Value]) -> ChainResult<()> {
    match args.first() {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(selector)) if !selector.is_empty() => Ok(()),
        Some(value) if TargetRef::from_arg(value).is_some() => Ok(()),
        Some(value) => Err(ChainError::invalid_argument(format!(
            "{command}: expected a selector or element reference, got {value}"
        ))),
    }
}

pub(crate) fn string_arg<'a>(command: &str, args: &'a [Value], index: usize) -> ChainResult<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::invalid_argument(format!("{command}: argument {index} must be a string")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strategies_follow_selector_prefix() {
        assert_eq!(find_strategy("#login"), ("css selector", "#login"));
        assert_eq!(find_strategy("//button"), ("xpath", "//button"));
        assert_eq!(find_strategy("(//a)[2]"), ("xpath", "(//a)[2]"));
        assert_eq!(find_strategy("./span"), ("xpath", "./span"));
        assert_eq!(find_strategy("=Sign in"), ("link text", "Sign in"));
        assert_eq!(find_strategy("*=Sign"), ("partial link text", "Sign"));
    }

    #[test]
    fn targets_validate() {
        assert!(validate_target("click", &[]).is_ok());
        assert!(validate_target("click", &[Value::Null]).is_ok());
        assert!(validate_target("click", &[json!("#a")]).is_ok());
        assert!(validate_target("click", &[TargetRef::new("#a", "el").to_arg()]).is_ok());
        assert!(validate_target("click", &[json!(3)]).unwrap_err().is_validation());
        assert!(validate_target("click", &[json!("")]).is_err());
    }

    #[test]
    fn selectors_come_from_strings_or_references() {
        assert_eq!(selector_of(Some(&json!("#a"))).unwrap(), "#a");
        let reference = TargetRef::new("#b", "el-2").to_arg();
        assert_eq!(selector_of(Some(&reference)).unwrap(), "#b");
        assert!(selector_of(None).is_err());
    }
}
