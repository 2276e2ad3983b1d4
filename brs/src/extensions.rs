//! Interpreter extensions and the registry that instantiates them by name

use crate::interp::{InterpResult, Interpreter};
use crate::runtime::config::TaskData;
use crate::task::message::HostMessage;
use std::collections::BTreeMap;

/// Lifecycle hooks an extension can implement; every hook defaults to a no-op
pub trait BrsExtension {
    fn name(&self) -> &str;

    /// Called once, when attached to an interpreter
    fn on_init(&mut self, _interp: &mut Interpreter) {}

    /// Called before a program starts executing
    fn on_before_execute(&mut self, _interp: &mut Interpreter) {}

    /// Source text of every loaded file, keyed by path
    fn update_source_map(&mut self, _source_map: &BTreeMap<String, String>) {}

    /// Called on a task thread before the task function runs
    fn exec_task(&mut self, _interp: &mut Interpreter, _task: &TaskData) -> InterpResult<()> {
        Ok(())
    }

    /// Called before every statement; an error stops execution
    fn tick(&mut self, _interp: &mut Interpreter) -> InterpResult<()> {
        Ok(())
    }
}

pub type ExtensionFactory = fn() -> Box<dyn BrsExtension>;

/// Named extension factories; each execution context gets fresh instances
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    factories: BTreeMap<String, ExtensionFactory>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the extensions shipped with the runtime
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Tracer::NAME, Tracer::create);
        registry
    }

    /// Register `factory` under `name`, replacing any previous registration
    pub fn register(&mut self, name: &str, factory: ExtensionFactory) {
        if self
            .factories
            .insert(name.to_ascii_lowercase(), factory)
            .is_some()
        {
            log::debug!("extension {name} re-registered");
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn clear(&mut self) {
        self.factories.clear();
    }

    /// Instantiate the named extensions in order; unknown names are skipped
    pub fn instantiate(&self, names: &[String]) -> Vec<Box<dyn BrsExtension>> {
        names
            .iter()
            .filter_map(|name| match self.factories.get(&name.to_ascii_lowercase()) {
                Some(factory) => Some(factory()),
                None => {
                    log::warn!("unknown extension '{name}'");
                    None
                }
            })
            .collect()
    }
}

/// Logs each executed statement at trace level and reports run totals
#[derive(Debug, Default)]
pub struct Tracer {
    statements: u64,
    files: usize,
}

impl Tracer {
    pub const NAME: &'static str = "tracer";

    fn create() -> Box<dyn BrsExtension> {
        Box::new(Tracer::default())
    }

    pub fn statements(&self) -> u64 {
        self.statements
    }

    fn report(&self, interp: &Interpreter, event: &str, extra: serde_json::Value) {
        let mut info = serde_json::json!({
            "event": event,
            "statements": self.statements,
            "files": self.files,
        });
        if let (Some(info), serde_json::Value::Object(extra)) = (info.as_object_mut(), extra) {
            info.extend(extra);
        }
        interp.context().post(HostMessage::Extension {
            name: Self::NAME.to_string(),
            info,
        });
    }
}

impl BrsExtension for Tracer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_init(&mut self, interp: &mut Interpreter) {
        self.report(interp, "init", serde_json::Value::Null);
    }

    fn on_before_execute(&mut self, interp: &mut Interpreter) {
        self.report(interp, "execute", serde_json::Value::Null);
    }

    fn update_source_map(&mut self, source_map: &BTreeMap<String, String>) {
        self.files = source_map.len();
    }

    fn exec_task(&mut self, interp: &mut Interpreter, task: &TaskData) -> InterpResult<()> {
        self.report(
            interp,
            "task",
            serde_json::json!({ "task": task.name, "function": task.function }),
        );
        Ok(())
    }

    fn tick(&mut self, interp: &mut Interpreter) -> InterpResult<()> {
        self.statements += 1;
        log::trace!("#{} {}", self.statements, interp.current_location());
        Ok(())
    }
}
