//! Reference-counted runtime components
//!
//! Every heap object (arrays, associative arrays, ...) implements
//! [`BrsComponent`]. Lifetime is explicit: each stored usage calls
//! `add_reference`, each release calls `remove_reference`, and the component
//! is disposed exactly once, when the count reaches zero while it is not
//! flagged as being returned from a function.

use super::Interpreter;
use super::error::{InterpResult, RuntimeError};
use super::value::Value;
use crate::ast::ValueKind;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Shared handle to a component
pub type ObjRef = Rc<dyn BrsComponent>;

/// Native implementation of a component method; receives the target object
pub type NativeMethod = fn(&mut Interpreter, &ObjRef, &[Value]) -> InterpResult<Value>;

/// One method of an interface
pub struct MethodSpec {
    /// Lowercase method name
    pub name: &'static str,
    pub args: &'static [(&'static str, ValueKind)],
    pub returns: ValueKind,
    pub func: NativeMethod,
}

/// A named capability group (`ifArray`, `ifEnum`, ...)
pub struct Interface {
    pub name: &'static str,
    pub methods: &'static [MethodSpec],
}

impl Interface {
    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Creation/disposal counters for one execution context
#[derive(Debug, Default)]
pub struct HeapStats {
    created: Cell<u64>,
    disposed: Cell<u64>,
    live: RefCell<BTreeMap<&'static str, u64>>,
}

impl HeapStats {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn record_create(&self, name: &'static str) {
        self.created.set(self.created.get() + 1);
        *self.live.borrow_mut().entry(name).or_insert(0) += 1;
    }

    fn record_dispose(&self, name: &'static str) {
        self.disposed.set(self.disposed.get() + 1);
        let mut live = self.live.borrow_mut();
        if let Some(count) = live.get_mut(name) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                live.remove(name);
            }
        }
    }

    pub fn created(&self) -> u64 {
        self.created.get()
    }

    pub fn disposed(&self) -> u64 {
        self.disposed.get()
    }

    /// Live component count per class name
    pub fn live(&self) -> Vec<(&'static str, u64)> {
        self.live.borrow().iter().map(|(k, v)| (*k, *v)).collect()
    }

    /// Report printed by the `BSCS` debug command
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Components created: {}, disposed: {}, live: {}",
            self.created(),
            self.disposed(),
            self.created() - self.disposed()
        )];
        for (name, count) in self.live() {
            lines.push(format!("  {name}: {count}"));
        }
        lines.join("\n")
    }
}

/// State shared by every component: name, reference count, lifecycle flags
pub struct ComponentCore {
    name: &'static str,
    references: Cell<usize>,
    returning: Cell<bool>,
    disposed: Cell<bool>,
    heap: Rc<HeapStats>,
}

impl ComponentCore {
    pub fn new(name: &'static str, heap: &Rc<HeapStats>) -> Self {
        heap.record_create(name);
        log::trace!("created {name}");
        Self {
            name,
            references: Cell::new(0),
            returning: Cell::new(false),
            disposed: Cell::new(false),
            heap: Rc::clone(heap),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

pub trait BrsComponent {
    fn core(&self) -> &ComponentCore;

    /// Static interface table of this component type
    fn interfaces(&self) -> &'static [Interface];

    fn as_any(&self) -> &dyn Any;

    /// Release owned contents; called once when the count reaches zero
    fn dispose(&self) {}

    /// `obj[index]`
    fn get_element(&self, _index: &Value) -> Result<Value, RuntimeError> {
        Err(RuntimeError::type_mismatch(&format!(
            "Attempting to index into non-indexable component \"{}\".",
            self.core().name
        )))
    }

    /// `obj[index] = value`
    fn set_element(&self, _index: &Value, _value: Value) -> Result<(), RuntimeError> {
        Err(RuntimeError::type_mismatch(&format!(
            "Attempting to assign by index to non-indexable component \"{}\".",
            self.core().name
        )))
    }

    /// `obj.name`; `None` when the component has no such property
    fn get_property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// `obj.name = value`
    fn set_property(&self, name: &str, _value: Value) -> Result<(), RuntimeError> {
        Err(RuntimeError::type_mismatch(&format!(
            "Attempting to set property \"{name}\" on component \"{}\".",
            self.core().name
        )))
    }

    /// Values visited by `for each`; `None` when not enumerable
    fn elements(&self) -> Option<Vec<Value>> {
        None
    }

    /// Text written by `print`
    fn to_display(&self) -> String {
        format!("<Component: {}>", self.core().name)
    }
}

impl dyn BrsComponent {
    pub fn name(&self) -> &'static str {
        self.core().name
    }

    pub fn references(&self) -> usize {
        self.core().references.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.core().disposed.get()
    }

    pub fn add_reference(&self) {
        let core = self.core();
        core.references.set(core.references.get() + 1);
    }

    /// Decrement; dispose when no usage remains and the value is not in flight
    pub fn remove_reference(&self) {
        let core = self.core();
        let count = core.references.get().saturating_sub(1);
        core.references.set(count);
        if count == 0 && !core.returning.get() {
            self.dispose_once();
        }
    }

    /// Protect a value being returned across a call boundary
    pub fn set_return(&self, returning: bool) {
        self.core().returning.set(returning);
    }

    pub fn is_returning(&self) -> bool {
        self.core().returning.get()
    }

    /// Dispose a temporary nobody took ownership of
    pub fn release_if_unowned(&self) {
        let core = self.core();
        if core.references.get() == 0 && !core.returning.get() {
            self.dispose_once();
        }
    }

    fn dispose_once(&self) {
        let core = self.core();
        if core.disposed.replace(true) {
            return;
        }
        log::trace!("disposing {}", core.name);
        self.dispose();
        core.heap.record_dispose(core.name);
    }

    /// Interface with this name (case-insensitive)
    pub fn interface(&self, name: &str) -> Option<&'static Interface> {
        self.interfaces()
            .iter()
            .find(|iface| iface.name.eq_ignore_ascii_case(name))
    }

    /// Method lookup, optionally restricted to one interface
    pub fn get_method(&self, name: &str, interface: Option<&str>) -> Option<&'static MethodSpec> {
        let name = name.to_ascii_lowercase();
        match interface {
            Some(iface) => self.interface(iface)?.method(&name),
            None => self.interfaces().iter().find_map(|iface| iface.method(&name)),
        }
    }
}

/// Count a new stored usage of `value` if it is a component
pub fn retain(value: &Value) {
    if let Some(obj) = value.as_object() {
        obj.add_reference();
    }
}

/// Release a stored usage of `value` if it is a component
pub fn release(value: &Value) {
    if let Some(obj) = value.as_object() {
        obj.remove_reference();
    }
}

/// Release a value being handed out of a container without disposing it
pub fn release_for_return(value: &Value) {
    if let Some(obj) = value.as_object() {
        obj.set_return(true);
        obj.remove_reference();
        obj.set_return(false);
    }
}
