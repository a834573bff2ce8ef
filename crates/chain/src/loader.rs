use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ChainConfig;

const ENV_PREFIX: &str = "WDCHAIN__";
const ENV_JSON: &str = "WDCHAIN_CONFIG_JSON";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

/// Defaults, then the YAML file at `path` (when it exists), then the
/// environment.
pub fn load_config(path: Option<&Path>) -> Result<ChainConfig, ConfigError> {
    let mut options = LoadOptions {
        include_env: true,
        ..LoadOptions::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_config_with_options(&options)
}

pub fn load_config_with_options(options: &LoadOptions) -> Result<ChainConfig, ConfigError> {
    let mut document = serde_json::to_value(ChainConfig::default())
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;

    for path in &options.paths {
        if path.exists() {
            apply_overlays(&mut document, overlays_from_file(path)?);
        }
    }

    if options.include_env {
        apply_overlays(&mut document, overlays_from_env()?);
    }

    serde_json::from_value(document).map_err(|err| ConfigError::Invalid(err.to_string()))
}

struct Overlay {
    path: Vec<String>,
    value: Value,
}

fn apply_overlays(document: &mut Value, overlays: Vec<Overlay>) {
    for overlay in overlays {
        set_path(document, &overlay.path, overlay.value);
    }
}

fn set_path(document: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = document;
    for segment in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let Value::Object(map) = cursor else {
            return;
        };
        cursor = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    if let Value::Object(map) = cursor {
        map.insert(last.clone(), value);
    }
}

fn overlays_from_file(path: &Path) -> Result<Vec<Overlay>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    Ok(flatten_value(json_value, Vec::new()))
}

fn overlays_from_env() -> Result<Vec<Overlay>, ConfigError> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect::<Vec<_>>();
            if path.is_empty() {
                continue;
            }
            overlays.push(Overlay {
                path,
                value: parse_env_value(&raw),
            });
        }
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| ConfigError::Invalid(format!("{ENV_JSON}: {err}")))?;
            overlays.extend(flatten_value(json_value, Vec::new()));
        }
    }

    Ok(overlays)
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

// `capture_on_failure` may legitimately be an object; it is kept whole so a
// flag from one layer can be replaced by options from another.
fn flatten_value(value: Value, prefix: Vec<String>) -> Vec<Overlay> {
    match value {
        Value::Object(map) if !is_opaque(&prefix) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let mut next = prefix.clone();
                next.push(key.trim().to_ascii_lowercase());
                result.extend(flatten_value(value, next));
            }
            result
        }
        other if !prefix.is_empty() => vec![Overlay {
            path: prefix,
            value: other,
        }],
        _ => Vec::new(),
    }
}

fn is_opaque(path: &[String]) -> bool {
    matches!(path, [only] if only == "capture_on_failure")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureOnFailure;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for (key, _) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                env::remove_var(key);
            }
        }
        env::remove_var(ENV_JSON);
    }

    #[test]
    #[serial]
    fn defaults_without_sources() {
        clear_env();
        let config = load_config(None).unwrap();
        assert_eq!(config, ChainConfig::default());
    }

    #[test]
    #[serial]
    fn yaml_file_then_env_override() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "base_url: https://example.com\norchestrated_mode: true\nwait:\n  timeout_ms: 500\ncapture_on_failure:\n  fullPage: true"
        )
        .unwrap();

        env::set_var("WDCHAIN__WAIT__TIMEOUT_MS", "2500");
        let config = load_config(Some(file.path())).unwrap();
        env::remove_var("WDCHAIN__WAIT__TIMEOUT_MS");

        assert_eq!(config.base_url.as_deref(), Some("https://example.com"));
        assert!(config.orchestrated_mode);
        assert_eq!(config.wait.timeout_ms, 2500);
        assert_eq!(config.wait.interval_ms, 100);
        assert!(matches!(config.capture_on_failure, CaptureOnFailure::Options(_)));
    }

    #[test]
    #[serial]
    fn json_overlay_applies_last() {
        clear_env();
        env::set_var(ENV_JSON, r#"{"capture_on_failure": true, "event_capacity": 8}"#);
        let config = load_config(None).unwrap();
        env::remove_var(ENV_JSON);

        assert!(config.capture_on_failure.enabled());
        assert_eq!(config.event_capacity, 8);
    }

    #[test]
    #[serial]
    fn invalid_yaml_is_reported() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wait: [unclosed").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    #[serial]
    fn missing_file_is_skipped() {
        clear_env();
        let options = LoadOptions {
            paths: vec![PathBuf::from("/nonexistent/wdchain.yaml")],
            include_env: false,
        };
        assert_eq!(
            load_config_with_options(&options).unwrap(),
            ChainConfig::default()
        );
    }
}
