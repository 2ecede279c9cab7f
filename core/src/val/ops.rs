use std::hash::{Hash, Hasher};
use std::mem;
use std::rc::Rc;

use rustc_hash::FxHasher;

use crate::val::error::kind;
use crate::val::list::{slot_get, slot_set};
use crate::val::Value;

/// Stable hash for map keys. Primitives hash by content; everything else
/// by identity.
pub trait Hashable {
    fn hash_value(&self) -> u64;
}

/// Read through a reference. Non-references return themselves.
pub trait Dereferenceable {
    fn deref_value(&self) -> Value;
}

/// Write through a reference. Returns the stored value, or an error value
/// when the target cannot be assigned.
pub trait Assignable {
    fn assign(&self, value: Value) -> Value;
}

#[inline]
fn address<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

impl Hashable for Value {
    fn hash_value(&self) -> u64 {
        if let Value::Unset = self {
            return Value::Nil.hash_value();
        }
        let mut hasher = FxHasher::default();
        mem::discriminant(self).hash(&mut hasher);
        match self {
            Value::Nil | Value::Unset | Value::Some | Value::Blank => {}
            Value::Boolean(b) => b.hash(&mut hasher),
            Value::Integer(n) => n.hash(&mut hasher),
            Value::Real(r) => r.to_bits().hash(&mut hasher),
            Value::String(s) => s.hash(&mut hasher),
            Value::Range(min, max) => {
                min.hash(&mut hasher);
                max.hash(&mut hasher);
            }
            Value::Tuple(items) => {
                for item in items.iter() {
                    item.hash_value().hash(&mut hasher);
                }
            }
            Value::Regex(r) => address(r).hash(&mut hasher),
            Value::Type(t) => address(t).hash(&mut hasher),
            Value::Method(m) => address(m).hash(&mut hasher),
            Value::Native(n) => address(n).hash(&mut hasher),
            Value::List(l) => address(l).hash(&mut hasher),
            Value::Names(n) => address(n).hash(&mut hasher),
            Value::Map(m) => address(m).hash(&mut hasher),
            Value::Variable(v) | Value::Global(v) => address(v).hash(&mut hasher),
            Value::ListSlot { list, index } => {
                address(list).hash(&mut hasher);
                index.hash(&mut hasher);
            }
            Value::MapNode(n) => address(n).hash(&mut hasher),
            Value::MapIndex(i) => address(i).hash(&mut hasher),
            Value::Uninitialized(u) => address(u).hash(&mut hasher),
            Value::Closure(c) => address(c).hash(&mut hasher),
            Value::Frame(f) => address(f).hash(&mut hasher),
            Value::Partial(p) => address(p).hash(&mut hasher),
            Value::Chained(c) => address(c).hash(&mut hasher),
            Value::ChainState(c) => address(c).hash(&mut hasher),
            Value::RangeIter { key, value, max } => {
                key.hash(&mut hasher);
                value.hash(&mut hasher);
                max.hash(&mut hasher);
            }
            Value::StringIter(s) => address(s).hash(&mut hasher),
            Value::StringBuffer(b) => address(b).hash(&mut hasher),
            Value::Error(e) | Value::ErrorValue(e) => address(e).hash(&mut hasher),
            Value::Module(m) => address(m).hash(&mut hasher),
            Value::Object(o) => address(o).hash(&mut hasher),
            Value::Array(a) => address(a).hash(&mut hasher),
        }
        hasher.finish()
    }
}

impl Dereferenceable for Value {
    fn deref_value(&self) -> Value {
        match self {
            Value::Variable(cell) | Value::Global(cell) => cell.borrow().deref_value(),
            Value::ListSlot { list, index } => slot_get(list, *index),
            Value::MapNode(node) => node.value(),
            Value::MapIndex(index) => index.current(),
            Value::Unset => Value::Nil,
            other => other.clone(),
        }
    }
}

impl Assignable for Value {
    fn assign(&self, value: Value) -> Value {
        match self {
            Value::Variable(cell) | Value::Global(cell) => {
                *cell.borrow_mut() = value.clone();
                value
            }
            Value::ListSlot { list, index } => slot_set(list, *index, value),
            Value::MapNode(node) => {
                node.set_value(value.clone());
                value
            }
            Value::MapIndex(index) => {
                index.map.insert(index.key.clone(), value.clone());
                value
            }
            Value::Error(_) => self.clone(),
            other => Value::error(
                kind::TYPE_ERROR,
                format!("<{}> is not assignable", other.kind_name()),
            ),
        }
    }
}

impl Value {
    /// Positional component of a packed value, 1-based. Lists and tuples
    /// unpack by position; anything else yields nil.
    pub fn unpack(&self, index: usize) -> Value {
        match self {
            Value::Tuple(items) => items.get(index.wrapping_sub(1)).cloned().unwrap_or(Value::Nil),
            Value::List(items) => items
                .borrow()
                .get(index.wrapping_sub(1))
                .cloned()
                .unwrap_or(Value::Nil),
            Value::Names(names) => names
                .get(index.wrapping_sub(1))
                .map(|name| Value::String(name.clone()))
                .unwrap_or(Value::Nil),
            _ => Value::Nil,
        }
    }
}
