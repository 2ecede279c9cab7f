use std::cell::RefCell;
use std::rc::Rc;

use crate::val::Value;

pub type ListRef = Rc<RefCell<Vec<Value>>>;

pub fn new_list() -> ListRef {
    Rc::new(RefCell::new(Vec::new()))
}

/// Read a slot; a slot that went away (list shrank) reads as nil.
pub fn slot_get(list: &ListRef, index: usize) -> Value {
    list.borrow().get(index).cloned().unwrap_or(Value::Nil)
}

pub fn slot_set(list: &ListRef, index: usize, value: Value) -> Value {
    let mut items = list.borrow_mut();
    match items.get_mut(index) {
        Some(slot) => {
            *slot = value.clone();
            value
        }
        None => Value::error(
            crate::val::error::kind::RANGE_ERROR,
            format!("list index {} out of range", index + 1),
        ),
    }
}

/// Resolve a 1-based index, negative counting from the end.
pub fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index - 1 };
    (0..len).contains(&resolved).then_some(resolved as usize)
}
