//! Container components: `roArray` and `roAssociativeArray`

use super::Interpreter;
use super::component::{
    BrsComponent, ComponentCore, HeapStats, Interface, MethodSpec, ObjRef, release,
    release_for_return, retain,
};
use super::error::{InterpResult, RuntimeError};
use super::value::Value;
use crate::ast::ValueKind;
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Largest number of elements an `roArray` may grow to
pub const MAX_ARRAY_LENGTH: usize = 4 * 1024 * 1024;

/// Class names `CreateObject` accepts
pub const CREATABLE_CLASSES: &[&str] = &["roArray", "roAssociativeArray", "roList"];

/// Instantiate a component class by (case-insensitive) name
pub fn create_object(heap: &Rc<HeapStats>, class: &str) -> Option<ObjRef> {
    match class.to_ascii_lowercase().as_str() {
        "roarray" | "rolist" => Some(RoArray::create(heap, Vec::new())),
        "roassociativearray" => Some(RoAssociativeArray::create(heap, Vec::new())),
        _ => None,
    }
}

fn index_of(index: &Value) -> Result<i64, RuntimeError> {
    match index {
        Value::Int32(_) | Value::Int64(_) => index.as_i64().ok_or_else(RuntimeError::index_out_of_bounds),
        Value::Float(x) => Ok(x.trunc() as i64),
        Value::Double(x) => Ok(x.trunc() as i64),
        other => Err(RuntimeError::type_mismatch(&format!(
            "Array indexes must be numeric, but received {}.",
            other.kind()
        ))),
    }
}

// ============================================
// roArray
// ============================================

pub struct RoArray {
    core: ComponentCore,
    elements: RefCell<Vec<Value>>,
}

impl RoArray {
    /// New array owning `elements`
    pub fn create(heap: &Rc<HeapStats>, elements: Vec<Value>) -> ObjRef {
        elements.iter().for_each(retain);
        Rc::new(RoArray {
            core: ComponentCore::new("roArray", heap),
            elements: RefCell::new(elements),
        })
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.elements.borrow().get(index).cloned()
    }

    pub fn push(&self, value: Value) {
        retain(&value);
        self.elements.borrow_mut().push(value);
    }

    fn clear(&self) {
        let old = std::mem::take(&mut *self.elements.borrow_mut());
        old.iter().for_each(release);
    }
}

impl BrsComponent for RoArray {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn interfaces(&self) -> &'static [Interface] {
        ARRAY_INTERFACES
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dispose(&self) {
        self.clear();
    }

    fn get_element(&self, index: &Value) -> Result<Value, RuntimeError> {
        let index = index_of(index)?;
        if index < 0 {
            return Err(RuntimeError::index_out_of_bounds());
        }
        Ok(self.get(index as usize).unwrap_or(Value::Invalid))
    }

    fn set_element(&self, index: &Value, value: Value) -> Result<(), RuntimeError> {
        let index = index_of(index)?;
        if index < 0 {
            return Err(RuntimeError::index_out_of_bounds());
        }
        let index = usize::try_from(index)
            .ok()
            .filter(|&index| index < MAX_ARRAY_LENGTH)
            .ok_or_else(RuntimeError::index_out_of_bounds)?;
        retain(&value);
        let old = {
            let mut elements = self.elements.borrow_mut();
            if index >= elements.len() {
                elements.resize(index + 1, Value::Invalid);
            }
            std::mem::replace(&mut elements[index], value)
        };
        release(&old);
        Ok(())
    }

    fn elements(&self) -> Option<Vec<Value>> {
        Some(self.elements.borrow().clone())
    }

    fn to_display(&self) -> String {
        let mut lines = vec!["<Component: roArray> =".to_string(), "[".to_string()];
        lines.extend(
            self.elements
                .borrow()
                .iter()
                .map(|v| format!("    {}", v.to_nested_string())),
        );
        lines.push("]".to_string());
        lines.join("\n")
    }
}

fn array(obj: &ObjRef) -> Result<&RoArray, RuntimeError> {
    obj.as_any()
        .downcast_ref::<RoArray>()
        .ok_or_else(|| RuntimeError::internal("receiver is not an roArray"))
}

fn array_push(_: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Invalid);
    array(obj)?.push(value);
    Ok(Value::Invalid)
}

fn array_pop(_: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    let value = array(obj)?.elements.borrow_mut().pop();
    Ok(take_out(value))
}

fn array_peek(_: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    Ok(array(obj)?.elements.borrow().last().cloned().unwrap_or(Value::Invalid))
}

fn array_shift(_: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    let arr = array(obj)?;
    let value = {
        let mut elements = arr.elements.borrow_mut();
        (!elements.is_empty()).then(|| elements.remove(0))
    };
    Ok(take_out(value))
}

fn array_unshift(_: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Invalid);
    retain(&value);
    array(obj)?.elements.borrow_mut().insert(0, value);
    Ok(Value::Invalid)
}

fn array_count(_: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    Ok(Value::Int32(array(obj)?.len() as i32))
}

fn array_clear(_: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    array(obj)?.clear();
    Ok(Value::Invalid)
}

fn array_append(interp: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    let arr = array(obj)?;
    let other = args
        .first()
        .and_then(Value::as_object)
        .and_then(|o| o.as_any().downcast_ref::<RoArray>());
    match other {
        Some(other) => {
            let items = other.elements.borrow().clone();
            items.into_iter().for_each(|v| arr.push(v));
        }
        None => interp.warn("BRIGHTSCRIPT: ERROR: roArray.Append: invalid parameter type"),
    }
    Ok(Value::Invalid)
}

fn array_get_entry(_: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    let index = args.first().cloned().unwrap_or(Value::Int32(0));
    Ok(array(obj)?.get_element(&index)?)
}

fn array_set_entry(_: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    let index = args.first().cloned().unwrap_or(Value::Int32(0));
    let value = args.get(1).cloned().unwrap_or(Value::Invalid);
    array(obj)?.set_element(&index, value)?;
    Ok(Value::Invalid)
}

fn array_is_empty(_: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    Ok(Value::Boolean(array(obj)?.is_empty()))
}

/// A value removed from a container stays alive for its caller
fn take_out(value: Option<Value>) -> Value {
    match value {
        Some(value) => {
            release_for_return(&value);
            value
        }
        None => Value::Invalid,
    }
}

static ARRAY_INTERFACES: &[Interface] = &[
    Interface {
        name: "ifArray",
        methods: &[
            MethodSpec { name: "push", args: &[("tvalue", ValueKind::Dynamic)], returns: ValueKind::Void, func: array_push },
            MethodSpec { name: "pop", args: &[], returns: ValueKind::Dynamic, func: array_pop },
            MethodSpec { name: "peek", args: &[], returns: ValueKind::Dynamic, func: array_peek },
            MethodSpec { name: "shift", args: &[], returns: ValueKind::Dynamic, func: array_shift },
            MethodSpec { name: "unshift", args: &[("tvalue", ValueKind::Dynamic)], returns: ValueKind::Void, func: array_unshift },
            MethodSpec { name: "count", args: &[], returns: ValueKind::Int32, func: array_count },
            MethodSpec { name: "clear", args: &[], returns: ValueKind::Void, func: array_clear },
            MethodSpec { name: "append", args: &[("array", ValueKind::Object)], returns: ValueKind::Void, func: array_append },
        ],
    },
    Interface {
        name: "ifArrayGet",
        methods: &[MethodSpec { name: "getentry", args: &[("index", ValueKind::Int32)], returns: ValueKind::Dynamic, func: array_get_entry }],
    },
    Interface {
        name: "ifArraySet",
        methods: &[MethodSpec {
            name: "setentry",
            args: &[("index", ValueKind::Int32), ("tvalue", ValueKind::Dynamic)],
            returns: ValueKind::Void,
            func: array_set_entry,
        }],
    },
    Interface {
        name: "ifEnum",
        methods: &[MethodSpec { name: "isempty", args: &[], returns: ValueKind::Boolean, func: array_is_empty }],
    },
];

// ============================================
// roAssociativeArray
// ============================================

/// String-keyed map; keys are case-insensitive and enumerate in sorted order
pub struct RoAssociativeArray {
    core: ComponentCore,
    entries: RefCell<BTreeMap<String, Value>>,
}

impl RoAssociativeArray {
    pub fn create(heap: &Rc<HeapStats>, pairs: Vec<(String, Value)>) -> ObjRef {
        let aa = RoAssociativeArray {
            core: ComponentCore::new("roAssociativeArray", heap),
            entries: RefCell::new(BTreeMap::new()),
        };
        for (key, value) in pairs {
            aa.insert(&key, value);
        }
        Rc::new(aa)
    }

    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(&key.to_ascii_lowercase()).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        retain(&value);
        let old = self
            .entries
            .borrow_mut()
            .insert(key.to_ascii_lowercase(), value);
        if let Some(old) = old {
            release(&old);
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        let old = self.entries.borrow_mut().remove(&key.to_ascii_lowercase());
        match old {
            Some(old) => {
                release(&old);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// (key, value) pairs in key order
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn clear(&self) {
        let old = std::mem::take(&mut *self.entries.borrow_mut());
        old.values().for_each(release);
    }
}

impl BrsComponent for RoAssociativeArray {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn interfaces(&self) -> &'static [Interface] {
        AA_INTERFACES
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dispose(&self) {
        self.clear();
    }

    fn get_element(&self, index: &Value) -> Result<Value, RuntimeError> {
        match index {
            Value::String(key) => Ok(self.lookup(key).unwrap_or(Value::Invalid)),
            other => Err(RuntimeError::type_mismatch(&format!(
                "Associative array keys must be strings, but received {}.",
                other.kind()
            ))),
        }
    }

    fn set_element(&self, index: &Value, value: Value) -> Result<(), RuntimeError> {
        match index {
            Value::String(key) => {
                self.insert(key, value);
                Ok(())
            }
            other => Err(RuntimeError::type_mismatch(&format!(
                "Associative array keys must be strings, but received {}.",
                other.kind()
            ))),
        }
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        Some(self.lookup(name).unwrap_or(Value::Invalid))
    }

    fn set_property(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        self.insert(name, value);
        Ok(())
    }

    fn elements(&self) -> Option<Vec<Value>> {
        Some(self.keys().into_iter().map(Value::string).collect())
    }

    fn to_display(&self) -> String {
        let mut lines = vec![
            "<Component: roAssociativeArray> =".to_string(),
            "{".to_string(),
        ];
        lines.extend(
            self.entries
                .borrow()
                .iter()
                .map(|(k, v)| format!("    {k}: {}", v.to_nested_string())),
        );
        lines.push("}".to_string());
        lines.join("\n")
    }
}

fn assoc(obj: &ObjRef) -> Result<&RoAssociativeArray, RuntimeError> {
    obj.as_any()
        .downcast_ref::<RoAssociativeArray>()
        .ok_or_else(|| RuntimeError::internal("receiver is not an roAssociativeArray"))
}

fn key_arg(args: &[Value]) -> &str {
    args.first().and_then(Value::as_str).unwrap_or_default()
}

fn aa_add_replace(_: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    let value = args.get(1).cloned().unwrap_or(Value::Invalid);
    assoc(obj)?.insert(key_arg(args), value);
    Ok(Value::Invalid)
}

fn aa_lookup(_: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    Ok(assoc(obj)?.lookup(key_arg(args)).unwrap_or(Value::Invalid))
}

fn aa_does_exist(_: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Boolean(assoc(obj)?.lookup(key_arg(args)).is_some()))
}

fn aa_delete(_: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Boolean(assoc(obj)?.remove(key_arg(args))))
}

fn aa_clear(_: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    assoc(obj)?.clear();
    Ok(Value::Invalid)
}

fn aa_count(_: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    Ok(Value::Int32(assoc(obj)?.len() as i32))
}

fn aa_keys(interp: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    let keys = assoc(obj)?.keys().into_iter().map(Value::string).collect();
    Ok(Value::Object(RoArray::create(interp.heap(), keys)))
}

fn aa_append(interp: &mut Interpreter, obj: &ObjRef, args: &[Value]) -> InterpResult<Value> {
    let aa = assoc(obj)?;
    let other = args
        .first()
        .and_then(Value::as_object)
        .and_then(|o| o.as_any().downcast_ref::<RoAssociativeArray>());
    match other {
        Some(other) => {
            for (key, value) in other.entries() {
                aa.insert(&key, value);
            }
        }
        None => interp.warn("BRIGHTSCRIPT: ERROR: roAssociativeArray.Append: invalid parameter type"),
    }
    Ok(Value::Invalid)
}

fn aa_is_empty(_: &mut Interpreter, obj: &ObjRef, _: &[Value]) -> InterpResult<Value> {
    Ok(Value::Boolean(assoc(obj)?.is_empty()))
}

static AA_INTERFACES: &[Interface] = &[
    Interface {
        name: "ifAssociativeArray",
        methods: &[
            MethodSpec {
                name: "addreplace",
                args: &[("key", ValueKind::String), ("value", ValueKind::Dynamic)],
                returns: ValueKind::Void,
                func: aa_add_replace,
            },
            MethodSpec { name: "lookup", args: &[("key", ValueKind::String)], returns: ValueKind::Dynamic, func: aa_lookup },
            MethodSpec { name: "doesexist", args: &[("key", ValueKind::String)], returns: ValueKind::Boolean, func: aa_does_exist },
            MethodSpec { name: "delete", args: &[("key", ValueKind::String)], returns: ValueKind::Boolean, func: aa_delete },
            MethodSpec { name: "clear", args: &[], returns: ValueKind::Void, func: aa_clear },
            MethodSpec { name: "count", args: &[], returns: ValueKind::Int32, func: aa_count },
            MethodSpec { name: "keys", args: &[], returns: ValueKind::Object, func: aa_keys },
            MethodSpec { name: "append", args: &[("aa", ValueKind::Object)], returns: ValueKind::Void, func: aa_append },
        ],
    },
    Interface {
        name: "ifEnum",
        methods: &[MethodSpec { name: "isempty", args: &[], returns: ValueKind::Boolean, func: aa_is_empty }],
    },
];
