//! Three-tier name resolution: Function > Module > Global, plus `m`

use super::component::{ObjRef, release, retain};
use super::error::{ErrorKind, RuntimeError};
use super::value::Value;
use crate::ast::Location;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Tier a name is defined in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Built-in functions, shared by every environment
    Global,
    /// Functions declared in the program's source files
    Module,
    /// Variables local to one function call
    Function,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Undefined variable '{0}'")]
    NotFound(String),
}

type SharedMap = Rc<RefCell<HashMap<String, Value>>>;

pub struct Environment {
    global: SharedMap,
    module: SharedMap,
    function: HashMap<String, Value>,
    m_pointer: ObjRef,
    root_m: ObjRef,
    current_line: u32,
}

impl Environment {
    /// Root environment; `root_m` is the `m` of plain function calls
    pub fn new(root_m: ObjRef) -> Self {
        Environment {
            global: Rc::default(),
            module: Rc::default(),
            function: HashMap::new(),
            m_pointer: Rc::clone(&root_m),
            root_m,
            current_line: 0,
        }
    }

    /// Shares Global and Module tiers, starts an empty Function tier
    pub fn create_sub_environment(&self) -> Environment {
        Environment {
            global: Rc::clone(&self.global),
            module: Rc::clone(&self.module),
            function: HashMap::new(),
            m_pointer: Rc::clone(&self.m_pointer),
            root_m: Rc::clone(&self.root_m),
            current_line: self.current_line,
        }
    }

    /// Bind `name` in `scope`.
    ///
    /// Function-scope bindings count as a reference to component values. A
    /// Function-scope name may not hide a declared function (Module) or a
    /// built-in (Global).
    pub fn define(
        &mut self,
        scope: Scope,
        name: &str,
        value: Value,
        location: Option<&Location>,
    ) -> Result<(), RuntimeError> {
        let key = name.to_ascii_lowercase();
        let fail = |e: RuntimeError| match location {
            Some(loc) => e.at(loc),
            None => e,
        };
        match scope {
            Scope::Function => {
                if key == "global" && value.as_object().is_none() {
                    return Err(fail(RuntimeError::type_mismatch(&format!(
                        "Unable to cast \"{}\" to \"Object\".",
                        value.kind()
                    ))));
                }
                if self.module.borrow().contains_key(&key) {
                    return Err(fail(RuntimeError::from_kind(ErrorKind::VarShadowsFunctionName)));
                }
                if self.global.borrow().contains_key(&key) {
                    return Err(fail(RuntimeError::from_kind(ErrorKind::NameShadowsBuiltin)));
                }
                retain(&value);
                if let Some(old) = self.function.insert(key, value) {
                    release(&old);
                }
            }
            Scope::Module => {
                if self.global.borrow().contains_key(&key) {
                    return Err(fail(RuntimeError::from_kind(ErrorKind::NameShadowsBuiltin)));
                }
                self.module.borrow_mut().insert(key, value);
            }
            Scope::Global => self.define_global(&key, value),
        }
        Ok(())
    }

    /// Bind a built-in; the Global tier accepts any name
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.global
            .borrow_mut()
            .insert(name.to_ascii_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Result<Value, EnvError> {
        let key = name.to_ascii_lowercase();
        match key.as_str() {
            "m" => return Ok(Value::Object(Rc::clone(&self.m_pointer))),
            "line_num" => return Ok(Value::Int32(self.current_line as i32)),
            _ => {}
        }
        if let Some(v) = self.function.get(&key) {
            return Ok(v.clone());
        }
        if let Some(v) = self.module.borrow().get(&key) {
            return Ok(v.clone());
        }
        if let Some(v) = self.global.borrow().get(&key) {
            return Ok(v.clone());
        }
        Err(EnvError::NotFound(name.to_string()))
    }

    /// Is `name` defined in any of `scopes` (all tiers when `None`)
    pub fn has(&self, name: &str, scopes: Option<&[Scope]>) -> bool {
        let key = name.to_ascii_lowercase();
        if key == "m" {
            return true;
        }
        let scopes = scopes.unwrap_or(&[Scope::Function, Scope::Module, Scope::Global]);
        scopes.iter().any(|scope| match scope {
            Scope::Function => self.function.contains_key(&key),
            Scope::Module => self.module.borrow().contains_key(&key),
            Scope::Global => self.global.borrow().contains_key(&key),
        })
    }

    /// Remove a binding (Function tier by default)
    pub fn remove(&mut self, name: &str, scope: Option<Scope>) {
        let key = name.to_ascii_lowercase();
        match scope.unwrap_or(Scope::Function) {
            Scope::Function => {
                if let Some(old) = self.function.remove(&key) {
                    release(&old);
                }
            }
            Scope::Module => {
                self.module.borrow_mut().remove(&key);
            }
            Scope::Global => {
                self.global.borrow_mut().remove(&key);
            }
        }
    }

    /// Release every Function-scope component; called when the environment is discarded
    pub fn remove_references(&mut self) {
        let locals = std::mem::take(&mut self.function);
        locals.values().for_each(release);
    }

    pub fn set_m_pointer(&mut self, m: ObjRef) {
        self.m_pointer = m;
    }

    pub fn m_pointer(&self) -> &ObjRef {
        &self.m_pointer
    }

    pub fn root_m(&self) -> &ObjRef {
        &self.root_m
    }

    pub fn set_current_line(&mut self, line: u32) {
        self.current_line = line;
    }

    /// Function-scope bindings sorted by name
    pub fn locals(&self) -> Vec<(String, Value)> {
        let mut locals: Vec<_> = self
            .function
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        locals.sort_by(|a, b| a.0.cmp(&b.0));
        locals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::collections::{RoArray, RoAssociativeArray};
    use crate::interp::component::HeapStats;

    fn env() -> (Environment, Rc<HeapStats>) {
        let heap = HeapStats::new();
        let m = RoAssociativeArray::create(&heap, Vec::new());
        (Environment::new(m), heap)
    }

    #[test]
    fn test_define_and_get_case_insensitive() {
        let (mut env, _) = env();
        env.define(Scope::Function, "Count", Value::Int32(3), None).unwrap();
        assert_eq!(env.get("COUNT"), Ok(Value::Int32(3)));
        assert_eq!(env.get("missing"), Err(EnvError::NotFound("missing".into())));
    }

    #[test]
    fn test_lookup_precedence() {
        let (mut env, _) = env();
        env.define(Scope::Global, "len", Value::Int32(1), None).unwrap();
        env.define(Scope::Module, "helper", Value::Int32(2), None).unwrap();
        assert_eq!(env.get("len"), Ok(Value::Int32(1)));
        assert_eq!(env.get("helper"), Ok(Value::Int32(2)));
        assert!(env.has("helper", Some(&[Scope::Module])));
        assert!(!env.has("helper", Some(&[Scope::Function])));
    }

    #[test]
    fn test_shadowing_rejected() {
        let (mut env, _) = env();
        env.define(Scope::Global, "len", Value::Int32(1), None).unwrap();
        env.define(Scope::Module, "helper", Value::Int32(2), None).unwrap();
        let err = env.define(Scope::Function, "helper", Value::Int32(0), None).unwrap_err();
        assert_eq!(err.errno(), 160);
        let err = env.define(Scope::Function, "LEN", Value::Int32(0), None).unwrap_err();
        assert_eq!(err.errno(), 157);
    }

    #[test]
    fn test_global_must_be_object() {
        let (mut env, _) = env();
        let err = env.define(Scope::Function, "global", Value::Int32(1), None).unwrap_err();
        assert_eq!(err.errno(), 24);
        assert!(err.message.contains("Unable to cast"));
    }

    #[test]
    fn test_sub_environment_isolation() {
        let (mut root, _) = env();
        root.define(Scope::Function, "local", Value::Int32(1), None).unwrap();
        let mut sub = root.create_sub_environment();
        assert!(sub.get("local").is_err());
        sub.define(Scope::Module, "shared", Value::Int32(2), None).unwrap();
        sub.define(Scope::Function, "inner", Value::Int32(3), None).unwrap();
        drop(sub);
        assert_eq!(root.get("shared"), Ok(Value::Int32(2)));
        assert!(root.get("inner").is_err());
    }

    #[test]
    fn test_m_and_line_num() {
        let (mut env, _) = env();
        assert!(env.has("m", None));
        assert!(matches!(env.get("M"), Ok(Value::Object(_))));
        env.set_current_line(12);
        assert_eq!(env.get("LINE_NUM"), Ok(Value::Int32(12)));
    }

    #[test]
    fn test_function_scope_reference_counting() {
        let (mut env, heap) = env();
        let arr = RoArray::create(&heap, Vec::new());
        env.define(Scope::Function, "a", Value::Object(arr.clone()), None).unwrap();
        env.define(Scope::Function, "b", Value::Object(arr.clone()), None).unwrap();
        assert_eq!(arr.references(), 2);
        env.define(Scope::Function, "a", Value::Invalid, None).unwrap();
        assert_eq!(arr.references(), 1);
        env.remove_references();
        assert!(arr.is_disposed());
    }

    #[test]
    fn test_remove() {
        let (mut env, heap) = env();
        let arr = RoArray::create(&heap, Vec::new());
        env.define(Scope::Function, "a", Value::Object(arr.clone()), None).unwrap();
        env.remove("A", None);
        assert!(!env.has("a", None));
        assert!(arr.is_disposed());
    }
}
