use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;
use wdchain_core_types::{ChainError, ChainErrorKind, ChainResult, Outcome};

use crate::command::{command_fn, Command, CommandPath, Signature};
use crate::commands;
use crate::context::CommandContext;

enum Entry {
    Command(Arc<dyn Command>),
    Namespace(HashMap<String, Arc<dyn Command>>),
}

/// Commands known to one session. Filled during the build step and frozen
/// when the session's first link is constructed.
#[derive(Default)]
pub struct CommandTable {
    entries: RwLock<HashMap<String, Entry>>,
    frozen: AtomicBool,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let table = Self::new();
        commands::install(&table);
        table
    }

    pub fn register<C>(&self, name: &str, command: C, force: bool) -> ChainResult<()>
    where
        C: Command + 'static,
    {
        self.register_arc(name, Arc::new(command), force)
    }

    pub fn register_arc(&self, name: &str, command: Arc<dyn Command>, force: bool) -> ChainResult<()> {
        self.ensure_open()?;
        let path = CommandPath::new(name)?;
        let mut entries = self.entries.write();
        match entries.get(path.name()) {
            Some(Entry::Namespace(_)) => {
                return Err(ChainErrorKind::NamespaceCollision(path.name().to_string()).into())
            }
            Some(Entry::Command(_)) if !force => {
                return Err(ChainErrorKind::DuplicateCommand(path.to_string()).into())
            }
            _ => {}
        }
        debug!(target: "wdchain::chain", command = %path, force, "command registered");
        entries.insert(path.name().to_string(), Entry::Command(command));
        Ok(())
    }

    pub fn register_in<C>(&self, namespace: &str, name: &str, command: C, force: bool) -> ChainResult<()>
    where
        C: Command + 'static,
    {
        self.ensure_open()?;
        let path = CommandPath::namespaced(namespace, name)?;
        let mut entries = self.entries.write();
        let entry = entries
            .entry(namespace.to_string())
            .or_insert_with(|| Entry::Namespace(HashMap::new()));
        let commands = match entry {
            Entry::Namespace(commands) => commands,
            Entry::Command(_) => {
                return Err(ChainErrorKind::NamespaceCollision(namespace.to_string()).into())
            }
        };
        if commands.contains_key(name) && !force {
            return Err(ChainErrorKind::DuplicateCommand(path.to_string()).into());
        }
        debug!(target: "wdchain::chain", command = %path, force, "command registered");
        commands.insert(name.to_string(), Arc::new(command));
        Ok(())
    }

    pub fn register_fn<F, Fut>(
        &self,
        name: &str,
        signature: Signature,
        body: F,
        force: bool,
    ) -> ChainResult<()>
    where
        F: Fn(CommandContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ChainResult<Outcome>> + Send + 'static,
    {
        self.register(name, command_fn(signature, body), force)
    }

    pub fn lookup(&self, path: &CommandPath) -> Option<Arc<dyn Command>> {
        let entries = self.entries.read();
        match (path.namespace(), entries.get(path.namespace().unwrap_or(path.name()))?) {
            (None, Entry::Command(command)) => Some(Arc::clone(command)),
            (Some(_), Entry::Namespace(commands)) => commands.get(path.name()).cloned(),
            _ => None,
        }
    }

    /// Whether `name` (plain or `namespace.name`) is a registered command.
    pub fn contains(&self, name: &str) -> bool {
        CommandPath::parse(name)
            .map(|path| self.lookup(&path).is_some())
            .unwrap_or(false)
    }

    /// Every registered command path, sorted.
    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut names = Vec::new();
        for (key, entry) in entries.iter() {
            match entry {
                Entry::Command(_) => names.push(key.clone()),
                Entry::Namespace(commands) => {
                    names.extend(commands.keys().map(|name| format!("{key}.{name}")))
                }
            }
        }
        names.sort();
        names
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> ChainResult<()> {
        if self.is_frozen() {
            Err(ChainError::new(ChainErrorKind::TableFrozen))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: &'static str) -> impl Command {
        command_fn(Signature::plain(), move |_ctx, _args| async move {
            Ok(Outcome::from(json!(value)))
        })
    }

    #[test]
    fn duplicate_names_need_force() {
        let table = CommandTable::new();
        table.register("greet", constant("hi"), false).unwrap();
        let err = table.register("greet", constant("hello"), false).unwrap_err();
        assert!(matches!(err.kind(), ChainErrorKind::DuplicateCommand(name) if name == "greet"));
        table.register("greet", constant("hello"), true).unwrap();
        assert!(table.contains("greet"));
    }

    #[test]
    fn namespaces_do_not_collide_with_commands() {
        let table = CommandTable::new();
        table.register("forms", constant("x"), false).unwrap();
        let err = table
            .register_in("forms", "fill", constant("y"), false)
            .unwrap_err();
        assert!(matches!(err.kind(), ChainErrorKind::NamespaceCollision(_)));

        table.register_in("auth", "login", constant("y"), false).unwrap();
        let err = table.register("auth", constant("z"), true).unwrap_err();
        assert!(matches!(err.kind(), ChainErrorKind::NamespaceCollision(_)));
        assert!(table.contains("auth.login"));
        assert!(!table.contains("auth"));
    }

    #[test]
    fn frozen_table_rejects_registration() {
        let table = CommandTable::new();
        table.freeze();
        let err = table.register("late", constant("x"), false).unwrap_err();
        assert!(matches!(err.kind(), ChainErrorKind::TableFrozen));
    }

    #[test]
    fn builtins_are_listed() {
        let table = CommandTable::with_builtins();
        let names = table.names();
        for name in ["click", "element", "getText", "url", "waitForExist", "end"] {
            assert!(names.iter().any(|n| n == name), "missing {name}");
        }
        assert!(!table.is_frozen());
    }
}
