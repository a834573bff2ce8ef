use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

/// One dispatched command. `result` is filled in when the link settles.
#[derive(Clone, Debug, Serialize)]
pub struct CommandLogEntry {
    pub name: String,
    pub args: Vec<Value>,
    pub timestamp: DateTime<Utc>,
    pub result: Option<Value>,
}

/// Append-only record of every command a session dispatched.
#[derive(Debug, Default)]
pub struct CommandLog {
    entries: RwLock<Vec<CommandLogEntry>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of the new entry.
    pub fn append(&self, name: impl Into<String>, args: Vec<Value>) -> usize {
        let mut entries = self.entries.write();
        entries.push(CommandLogEntry {
            name: name.into(),
            args,
            timestamp: Utc::now(),
            result: None,
        });
        entries.len() - 1
    }

    pub fn record_result(&self, index: usize, result: Value) {
        if let Some(entry) = self.entries.write().get_mut(index) {
            entry.result = Some(result);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<CommandLogEntry> {
        self.entries.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_grow_and_results_fill_in() {
        let log = CommandLog::new();
        let first = log.append("url", vec![json!("https://example.com")]);
        let second = log.append("getTitle", vec![]);
        log.record_result(second, json!("Example"));

        let entries = log.snapshot();
        assert_eq!((first, second), (0, 1));
        assert_eq!(entries.len(), 2);
        assert!(entries[0].result.is_none());
        assert_eq!(entries[1].result, Some(json!("Example")));
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }
}
