//! Continuation-based iteration protocol.
//!
//! `iterate` turns an iterable into its first state (or nil when empty).
//! `next` advances a state, `key` and `value` read it. Nil is the
//! exhausted state and every operation on it yields nil again.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dispatch::Callable;
use crate::rt::{Caller, Runtime};
use crate::val::error::kind;
use crate::val::{Dereferenceable, StringIter, Value};

pub mod chain;


/// Values that can start an iteration.
pub trait Iterable {
    fn iterate(&self, rt: &Runtime, caller: Caller);
}

/// Iteration states.
pub trait IteratorState {
    fn next(&self, rt: &Runtime, caller: Caller);
    fn key(&self, rt: &Runtime, caller: Caller);
    fn value(&self, rt: &Runtime, caller: Caller);
}

fn not_iteratable(value: &Value) -> Value {
    Value::error(kind::TYPE_ERROR, format!("<{}> is not iteratable", value.kind_name()))
}

fn not_an_iterator(value: &Value) -> Value {
    Value::error(kind::TYPE_ERROR, format!("<{}> is not an iterator", value.kind_name()))
}

fn string_iter(string: Rc<str>, offset: usize, key: i64) -> Value {
    if offset >= string.len() {
        Value::Nil
    } else {
        Value::StringIter(Rc::new(StringIter { string, offset, key }))
    }
}

impl Iterable for Value {
    fn iterate(&self, rt: &Runtime, caller: Caller) {
        let first = match self {
            Value::List(items) => {
                if items.borrow().is_empty() {
                    Value::Nil
                } else {
                    Value::ListSlot {
                        list: items.clone(),
                        index: 0,
                    }
                }
            }
            Value::Names(names) => {
                if names.is_empty() {
                    Value::Nil
                } else {
                    let items = names.iter().map(|name| Value::String(name.clone())).collect();
                    Value::ListSlot {
                        list: Rc::new(RefCell::new(items)),
                        index: 0,
                    }
                }
            }
            Value::Map(map) => map.first().map(Value::MapNode).unwrap_or(Value::Nil),
            Value::Range(min, max) => {
                if min > max {
                    Value::Nil
                } else {
                    Value::RangeIter {
                        key: 1,
                        value: *min,
                        max: *max,
                    }
                }
            }
            Value::String(s) => string_iter(s.clone(), 0, 1),
            Value::Closure(closure) => {
                closure.call(rt, caller, Vec::new());
                return;
            }
            Value::Chained(chain) => {
                chain::start(rt, caller, chain.clone());
                return;
            }
            Value::Error(_) => self.clone(),
            other => not_iteratable(other),
        };
        rt.resume(caller, first);
    }
}

impl IteratorState for Value {
    fn next(&self, rt: &Runtime, caller: Caller) {
        let next = match self {
            Value::Nil => Value::Nil,
            Value::ListSlot { list, index } => {
                if index + 1 < list.borrow().len() {
                    Value::ListSlot {
                        list: list.clone(),
                        index: index + 1,
                    }
                } else {
                    Value::Nil
                }
            }
            Value::MapNode(node) => node.next().map(Value::MapNode).unwrap_or(Value::Nil),
            Value::RangeIter { key, value, max } => {
                if value >= max {
                    Value::Nil
                } else {
                    Value::RangeIter {
                        key: key + 1,
                        value: value + 1,
                        max: *max,
                    }
                }
            }
            Value::StringIter(iter) => {
                let width = iter.current().map(char::len_utf8).unwrap_or(1);
                string_iter(iter.string.clone(), iter.offset + width, iter.key + 1)
            }
            Value::Frame(frame) => {
                frame.iter_next(rt, caller);
                return;
            }
            Value::ChainState(state) => {
                state.clone().advance(rt, caller);
                return;
            }
            Value::Error(_) => self.clone(),
            other => not_an_iterator(other),
        };
        rt.resume(caller, next);
    }

    fn key(&self, rt: &Runtime, caller: Caller) {
        let key = match self {
            Value::Nil => Value::Nil,
            Value::ListSlot { index, .. } => Value::Integer(*index as i64 + 1),
            Value::MapNode(node) => node.key().clone(),
            Value::RangeIter { key, .. } => Value::Integer(*key),
            Value::StringIter(iter) => Value::Integer(iter.key),
            Value::Frame(frame) => frame.yielded(2),
            Value::ChainState(state) => state.key(),
            Value::Error(_) => self.clone(),
            other => not_an_iterator(other),
        };
        rt.resume(caller, key);
    }

    fn value(&self, rt: &Runtime, caller: Caller) {
        let value = match self {
            Value::Nil => Value::Nil,
            Value::ListSlot { .. } | Value::MapNode(_) => self.clone(),
            Value::RangeIter { value, .. } => Value::Integer(*value),
            Value::StringIter(iter) => iter
                .current()
                .map(|c| Value::string(c.encode_utf8(&mut [0; 4])))
                .unwrap_or(Value::Nil),
            Value::Frame(frame) => frame.yielded(1),
            Value::ChainState(state) => state.value(),
            Value::Error(_) => self.clone(),
            other => not_an_iterator(other),
        };
        rt.resume(caller, value);
    }
}

pub(crate) fn iterate_now(rt: &Runtime, caller: Caller, value: Value) {
    value.deref_value().iterate(rt, caller);
}

pub(crate) fn next_now(rt: &Runtime, caller: Caller, state: Value) {
    state.next(rt, caller);
}

pub(crate) fn key_now(rt: &Runtime, caller: Caller, state: Value) {
    state.key(rt, caller);
}

pub(crate) fn value_now(rt: &Runtime, caller: Caller, state: Value) {
    state.value(rt, caller);
}
