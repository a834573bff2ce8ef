use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::recovery::RecoveryChain;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub connection_retry_count: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4444".into(),
            request_timeout_ms: 90_000,
            connection_retry_count: 3,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaitConfig {
    pub timeout_ms: u64,
    pub interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1_000,
            interval_ms: 100,
        }
    }
}

impl WaitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// `capture_on_failure: true` or `capture_on_failure: { ...options }`.
/// An options object enables capture; its contents are handed to event
/// consumers untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CaptureOnFailure {
    Flag(bool),
    Options(Map<String, Value>),
}

impl Default for CaptureOnFailure {
    fn default() -> Self {
        CaptureOnFailure::Flag(false)
    }
}

impl CaptureOnFailure {
    pub fn enabled(&self) -> bool {
        match self {
            CaptureOnFailure::Flag(flag) => *flag,
            CaptureOnFailure::Options(_) => true,
        }
    }

    pub fn options(&self) -> Option<&Map<String, Value>> {
        match self {
            CaptureOnFailure::Options(options) => Some(options),
            CaptureOnFailure::Flag(_) => None,
        }
    }
}

/// Serializable session settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChainConfig {
    pub transport: TransportSettings,
    /// Prefix joined onto relative `url` arguments.
    pub base_url: Option<String>,
    pub capture_on_failure: CaptureOnFailure,
    pub capture_destination: Option<PathBuf>,
    pub orchestrated_mode: bool,
    pub wait: WaitConfig,
    pub event_capacity: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            base_url: None,
            capture_on_failure: CaptureOnFailure::default(),
            capture_destination: None,
            orchestrated_mode: false,
            wait: WaitConfig::default(),
            event_capacity: 256,
        }
    }
}

/// Everything a session is built with. Frozen behind an `Arc` once the
/// session exists.
#[derive(Clone, Default)]
pub struct SessionConfig {
    pub settings: ChainConfig,
    pub recovery: RecoveryChain,
}

impl SessionConfig {
    pub fn new(settings: ChainConfig) -> Self {
        Self {
            settings,
            recovery: RecoveryChain::default(),
        }
    }

    pub fn with_recovery(mut self, recovery: RecoveryChain) -> Self {
        self.recovery = recovery;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn capture_accepts_flag_or_options() {
        let flag: CaptureOnFailure = serde_json::from_value(json!(true)).unwrap();
        assert!(flag.enabled());
        let options: CaptureOnFailure =
            serde_json::from_value(json!({ "fullPage": true })).unwrap();
        assert!(options.enabled());
        assert_eq!(options.options().unwrap()["fullPage"], json!(true));
        assert!(!CaptureOnFailure::default().enabled());
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config: ChainConfig =
            serde_json::from_value(json!({ "wait": { "timeout_ms": 2500 } })).unwrap();
        assert_eq!(config.wait.timeout_ms, 2500);
        assert_eq!(config.wait.interval_ms, 100);
        assert_eq!(config.event_capacity, 256);
    }
}
