use std::cell::RefCell;
use std::rc::Rc;

use crate::val::Value;

/// Captured variables of a closure, shared so placeholders can patch them.
pub type Upvalues = Rc<RefCell<Vec<Value>>>;

/// Stand-in for a `let` binding captured before it is assigned. Every
/// capture records where it landed; `resolve` patches all of them.
pub struct Uninitialized {
    name: Rc<str>,
    uses: RefCell<Vec<(Upvalues, usize)>>,
}

impl Uninitialized {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from(name),
            uses: RefCell::new(Vec::new()),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_use(&self, target: &Upvalues, index: usize) {
        self.uses.borrow_mut().push((target.clone(), index));
    }

    pub fn pending_uses(&self) -> usize {
        self.uses.borrow().len()
    }

    pub fn resolve(&self, value: &Value) {
        let uses = self.uses.take();
        tracing::trace!(target: "kestrel::frame", name = %self.name, uses = uses.len(), "resolve placeholder");
        for (target, index) in uses {
            if let Some(slot) = target.borrow_mut().get_mut(index) {
                *slot = value.clone();
            }
        }
    }
}
