use serde_json::{json, Value};

/// W3C WebDriver element reference key.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
/// JSON wire protocol element reference key, still emitted by older drivers.
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

const SELECTOR_KEY: &str = "selector";

/// A resolved element on the remote side together with the selector that found it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TargetRef {
    pub selector: String,
    pub handle: String,
}

impl TargetRef {
    pub fn new(selector: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            handle: handle.into(),
        }
    }

    /// Argument form used when a target is passed to a command.
    pub fn to_arg(&self) -> Value {
        json!({
            ELEMENT_KEY: self.handle,
            SELECTOR_KEY: self.selector,
        })
    }

    /// Parses the argument form produced by [`TargetRef::to_arg`]. The legacy
    /// `ELEMENT` key is accepted as well.
    pub fn from_arg(value: &Value) -> Option<Self> {
        let handle = element_handle(value)?;
        let selector = value
            .get(SELECTOR_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default();
        Some(Self::new(selector, handle))
    }

    /// Parses an element reference as returned by the driver's find-element call.
    pub fn from_driver(selector: &str, value: &Value) -> Option<Self> {
        element_handle(value).map(|handle| Self::new(selector, handle))
    }
}

fn element_handle(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    map.get(ELEMENT_KEY)
        .or_else(|| map.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
}

/// Result of one command. Dispatch switches on the variant instead of probing
/// the shape of a JSON value.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Value(Value),
    Target(TargetRef),
    NotFound { selector: String, reason: String },
}

impl Outcome {
    pub fn unit() -> Self {
        Outcome::Value(Value::Null)
    }

    pub fn not_found(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Outcome::NotFound {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// JSON projection of the outcome, used for logging, events and normalization.
    pub fn value(&self) -> Value {
        match self {
            Outcome::Value(value) => value.clone(),
            Outcome::Target(target) => target.to_arg(),
            Outcome::NotFound { selector, reason } => json!({
                "error": "no such element",
                "selector": selector,
                "message": reason,
            }),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&TargetRef> {
        match self {
            Outcome::Target(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Outcome::NotFound { .. })
    }
}

impl Default for Outcome {
    fn default() -> Self {
        Outcome::unit()
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

impl From<TargetRef> for Outcome {
    fn from(target: TargetRef) -> Self {
        Outcome::Target(target)
    }
}

impl From<bool> for Outcome {
    fn from(value: bool) -> Self {
        Outcome::Value(Value::Bool(value))
    }
}

impl From<String> for Outcome {
    fn from(value: String) -> Self {
        Outcome::Value(Value::String(value))
    }
}

impl From<&str> for Outcome {
    fn from(value: &str) -> Self {
        Outcome::Value(Value::String(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_round_trips_through_argument_form() {
        let target = TargetRef::new("#login", "el-7");
        let arg = target.to_arg();
        assert_eq!(arg[ELEMENT_KEY], "el-7");
        assert_eq!(TargetRef::from_arg(&arg), Some(target));
    }

    #[test]
    fn legacy_element_key_is_accepted() {
        let value = json!({ "ELEMENT": "0.42-1" });
        let target = TargetRef::from_driver("a.more", &value).unwrap();
        assert_eq!(target.handle, "0.42-1");
        assert_eq!(target.selector, "a.more");
    }

    #[test]
    fn plain_values_are_not_targets() {
        assert!(TargetRef::from_arg(&json!("#login")).is_none());
        assert!(TargetRef::from_arg(&json!({ "value": 1 })).is_none());
    }

    #[test]
    fn not_found_projects_selector() {
        let outcome = Outcome::not_found("#gone", "no element matched");
        assert!(outcome.is_not_found());
        assert_eq!(outcome.value()["selector"], "#gone");
        assert!(outcome.as_target().is_none());
    }
}
