use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::dispatch::Method;
use crate::iter::chain::{ChainState, Chained};
use crate::vm::{Closure, Frame};

pub mod array;
pub mod error;
pub mod list;
pub mod map;
pub mod native;
pub mod object;
pub mod ops;
pub mod partial;
pub mod types;
pub mod uninit;


pub use array::{ArrayKind, ArrayValue};
pub use error::ErrorValue;
pub use list::ListRef;
pub use map::{MapIndex, MapNode, MapRef, MapValue};
pub use native::NativeFunction;
pub use object::{Module, Object};
pub use ops::{Assignable, Dereferenceable, Hashable};
pub use partial::Partial;
pub use types::{BuiltinTypes, Type, TypeId, TypeRegistry};
pub use uninit::{Uninitialized, Upvalues};

/// Every value the runtime can hold.
///
/// Reference-like variants (`Variable`, `ListSlot`, `MapNode`, `MapIndex`,
/// `Global`) read through `deref_value` and write through `assign`.
/// `Unset` only ever lives in frame slots and reads as `Nil`.
#[derive(Clone)]
pub enum Value {
    Nil,
    Some,
    Blank,
    Unset,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(Rc<str>),
    Regex(Rc<Regex>),
    Type(Rc<Type>),
    Method(Rc<Method>),
    Native(Rc<NativeFunction>),
    List(ListRef),
    Names(Rc<[Rc<str>]>),
    Map(MapRef),
    Tuple(Rc<[Value]>),
    Variable(Rc<RefCell<Value>>),
    ListSlot { list: ListRef, index: usize },
    MapNode(Rc<MapNode>),
    MapIndex(Rc<MapIndex>),
    Global(Rc<RefCell<Value>>),
    Uninitialized(Rc<Uninitialized>),
    Closure(Rc<Closure>),
    Frame(Rc<Frame>),
    Partial(Rc<Partial>),
    Chained(Rc<Chained>),
    ChainState(Rc<ChainState>),
    Range(i64, i64),
    RangeIter { key: i64, value: i64, max: i64 },
    StringIter(Rc<StringIter>),
    StringBuffer(Rc<RefCell<String>>),
    Error(Rc<ErrorValue>),
    ErrorValue(Rc<ErrorValue>),
    Module(Rc<Module>),
    Object(Rc<Object>),
    Array(Rc<ArrayValue>),
}

/// Cursor over the characters of a string. `offset` is a byte offset.
#[derive(Debug)]
pub struct StringIter {
    pub string: Rc<str>,
    pub offset: usize,
    pub key: i64,
}

impl StringIter {
    pub fn current(&self) -> Option<char> {
        self.string[self.offset..].chars().next()
    }
}

impl Value {
    pub fn string(text: &str) -> Value {
        Value::String(Rc::from(text))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::from(items))
    }

    pub fn names<I, S>(names: I) -> Value
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<Rc<str>> = names.into_iter().map(|name| Rc::from(name.as_ref())).collect();
        Value::Names(Rc::from(names))
    }

    pub fn variable(value: Value) -> Value {
        Value::Variable(Rc::new(RefCell::new(value)))
    }

    pub fn global(value: Value) -> Value {
        Value::Global(Rc::new(RefCell::new(value)))
    }

    pub fn boolean(flag: bool) -> Value {
        Value::Boolean(flag)
    }

    /// `Some` for true, `Nil` for false; the language's truthiness pair.
    pub fn truth(flag: bool) -> Value {
        if flag { Value::Some } else { Value::Nil }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil | Value::Unset)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the builtin type this variant belongs to.
    pub fn kind_name(&self) -> Cow<'static, str> {
        let name = match self {
            Value::Nil | Value::Unset => "nil",
            Value::Some => "some",
            Value::Blank => "blank",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Regex(_) => "regex",
            Value::Type(_) => "type",
            Value::Method(_) => "method",
            Value::Native(_) => "native",
            Value::List(_) => "list",
            Value::Names(_) => "names",
            Value::Map(_) => "map",
            Value::Tuple(_) => "tuple",
            Value::Variable(_) => "variable",
            Value::ListSlot { .. } => "list-node",
            Value::MapNode(_) => "map-node",
            Value::MapIndex(_) => "map-index",
            Value::Global(_) => "global",
            Value::Uninitialized(_) => "uninitialized",
            Value::Closure(_) => "closure",
            Value::Frame(_) => "frame",
            Value::Partial(_) => "partial-function",
            Value::Chained(_) => "chained-function",
            Value::ChainState(_) => "chained-state",
            Value::Range(..) => "range",
            Value::RangeIter { .. } => "range-iter",
            Value::StringIter(_) => "string-iter",
            Value::StringBuffer(_) => "stringbuffer",
            Value::Error(_) => "error",
            Value::ErrorValue(_) => "error-value",
            Value::Module(_) => "module",
            Value::Object(object) => return Cow::Owned(object.ty().name().to_string()),
            Value::Array(array) => return Cow::Owned(format!("array::{}", array.kind().name())),
        };
        Cow::Borrowed(name)
    }

    /// Key equality used by maps: content for primitives, identity for the rest.
    /// Consistent with `Hashable::hash_value`.
    pub fn same_key(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil | Value::Unset, Value::Nil | Value::Unset) => true,
            (Value::Some, Value::Some) | (Value::Blank, Value::Blank) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Range(a0, a1), Value::Range(b0, b1)) => a0 == b0 && a1 == b1,
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_key(y))
            }
            (Value::Names(a), Value::Names(b)) => Rc::ptr_eq(a, b),
            (Value::Regex(a), Value::Regex(b)) => Rc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => Rc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Variable(a), Value::Variable(b)) => Rc::ptr_eq(a, b),
            (Value::Global(a), Value::Global(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Frame(a), Value::Frame(b)) => Rc::ptr_eq(a, b),
            (Value::Partial(a), Value::Partial(b)) => Rc::ptr_eq(a, b),
            (Value::Chained(a), Value::Chained(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) | (Value::ErrorValue(a), Value::ErrorValue(b)) => {
                Rc::ptr_eq(a, b)
            }
            (Value::StringBuffer(a), Value::StringBuffer(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

/// Format a real so that it always reads back as a real.
pub fn format_real(value: f64) -> String {
    if value.is_finite() {
        let mut buffer = ryu::Buffer::new();
        buffer.format_finite(value).to_string()
    } else if value.is_nan() {
        "nan".to_string()
    } else if value > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}

pub fn format_integer(value: i64) -> String {
    let mut buffer = itoa::Buffer::new();
    buffer.format(value).to_string()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil | Value::Unset => f.write_str("nil"),
            Value::Some => f.write_str("some"),
            Value::Blank => f.write_str("_"),
            Value::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Integer(n) => f.write_str(itoa::Buffer::new().format(*n)),
            Value::Real(r) => f.write_str(&format_real(*r)),
            Value::String(s) => f.write_str(s),
            Value::Regex(r) => write!(f, "/{}/", r.as_str()),
            Value::Type(t) => write!(f, "<<{}>>", t.name()),
            Value::Method(m) => write!(f, ":{}", m.name()),
            Value::Native(n) => write!(f, "<native {}>", n.name()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Names(names) => {
                f.write_str("names(")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(name)?;
                }
                f.write_str(")")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, node) in map.nodes().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} is {}", node.key(), node.value())?;
                }
                f.write_str("}")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Variable(cell) | Value::Global(cell) => write!(f, "{}", cell.borrow()),
            Value::ListSlot { list, index } => match list.borrow().get(*index) {
                Some(value) => write!(f, "{value}"),
                None => f.write_str("nil"),
            },
            Value::MapNode(node) => write!(f, "{}", node.value()),
            Value::MapIndex(index) => write!(f, "{}", index.current()),
            Value::Uninitialized(u) => write!(f, "<uninitialized {}>", u.name()),
            Value::Range(min, max) => write!(f, "{min} .. {max}"),
            Value::StringBuffer(buffer) => f.write_str(&buffer.borrow()),
            Value::Error(err) => write!(f, "{}: {}", err.kind(), err.message()),
            Value::ErrorValue(err) => write!(f, "{}: {}", err.kind(), err.message()),
            Value::Module(module) => write!(f, "<module {}>", module.name()),
            Value::Object(object) => write!(f, "<{}>", object.ty().name()),
            Value::Array(array) => write!(f, "{array}"),
            other => write!(f, "<{}>", other.kind_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Error(err) => write!(f, "Error({}: {})", err.kind(), err.message()),
            other => write!(f, "{other}"),
        }
    }
}
