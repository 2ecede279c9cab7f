use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::val::Value;

/// A function with some argument positions pre-filled.
pub struct Partial {
    func: Value,
    args: RefCell<Vec<Option<Value>>>,
    count: Cell<usize>,
    set: Cell<usize>,
}

impl Partial {
    pub fn new(func: Value, capacity: usize) -> Rc<Self> {
        Rc::new(Self {
            func,
            args: RefCell::new(vec![None; capacity]),
            count: Cell::new(0),
            set: Cell::new(0),
        })
    }

    #[inline]
    pub fn func(&self) -> &Value {
        &self.func
    }

    /// Fill position `index` (0-based).
    pub fn set(&self, index: usize, value: Value) {
        let mut args = self.args.borrow_mut();
        if index >= args.len() {
            args.resize(index + 1, None);
        }
        if args[index].replace(value).is_none() {
            self.set.set(self.set.get() + 1);
        }
        if index >= self.count.get() {
            self.count.set(index + 1);
        }
    }

    /// Merge call-time arguments into the holes, left to right; extras go
    /// after the highest filled position.
    pub fn combine(&self, call_args: Vec<Value>) -> Vec<Value> {
        let args = self.args.borrow();
        let count = self.count.get();
        let total = (call_args.len() + self.set.get()).max(count);
        let mut supplied = call_args.into_iter();
        let mut combined = Vec::with_capacity(total);
        for slot in args.iter().take(count) {
            combined.push(match slot {
                Some(value) => value.clone(),
                None => supplied.next().unwrap_or(Value::Nil),
            });
        }
        while combined.len() < total {
            combined.push(supplied.next().unwrap_or(Value::Nil));
        }
        combined
    }
}
