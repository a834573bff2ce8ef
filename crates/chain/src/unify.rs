use std::future::IntoFuture;

use futures::future::try_join_all;
use serde_json::Value;
use wdchain_core_types::{ChainResult, Outcome};

use crate::link::Link;

#[derive(Clone, Copy, Debug, Default)]
pub struct UnifyOptions {
    /// Replace `{ "value": x }` objects by `x`.
    pub extract_value: bool,
    pub lowercase: bool,
}

/// Collapses one or many results: a single result is returned as is, several
/// become an array.
pub fn unify_values(values: Vec<Value>, options: &UnifyOptions) -> Value {
    let mut values: Vec<Value> = values
        .into_iter()
        .map(|value| normalize(value, options))
        .collect();
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}

/// Treats an array outcome as many results.
pub fn unify_outcome(outcome: &Outcome, options: &UnifyOptions) -> Value {
    match outcome.value() {
        Value::Array(items) => unify_values(items, options),
        other => unify_values(vec![other], options),
    }
}

pub async fn unify(links: Vec<Link>, options: UnifyOptions) -> ChainResult<Value> {
    let outcomes = try_join_all(links.into_iter().map(|link| link.into_future())).await?;
    let values = outcomes
        .iter()
        .map(|outcome| unify_outcome(outcome, &options))
        .collect();
    Ok(unify_values(values, &UnifyOptions::default()))
}

fn normalize(value: Value, options: &UnifyOptions) -> Value {
    let value = match value {
        Value::Object(mut map) if options.extract_value && map.contains_key("value") => {
            map.remove("value").unwrap_or(Value::Null)
        }
        other => other,
    };
    match value {
        Value::String(text) if options.lowercase => Value::String(text.to_lowercase()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_values_are_unwrapped() {
        let unified = unify_values(vec![json!("Example")], &UnifyOptions::default());
        assert_eq!(unified, json!("Example"));
    }

    #[test]
    fn many_values_become_an_array() {
        let options = UnifyOptions {
            extract_value: true,
            lowercase: true,
        };
        let unified = unify_values(
            vec![json!({ "value": "RED" }), json!("Blue"), json!(3)],
            &options,
        );
        assert_eq!(unified, json!(["red", "blue", 3]));
    }

    #[test]
    fn array_outcomes_are_flattened_once() {
        let outcome = Outcome::from(json!(["A"]));
        let options = UnifyOptions {
            lowercase: true,
            ..UnifyOptions::default()
        };
        assert_eq!(unify_outcome(&outcome, &options), json!("a"));
    }
}
