use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::val::Value;

/// Process-wide named values: builtin types, library functions, modules.
pub struct Globals {
    values: RefCell<FxHashMap<Rc<str>, Value>>,
}

impl Globals {
    pub fn new() -> Self {
        Self {
            values: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn define(&self, name: &str, value: Value) {
        self.values.borrow_mut().insert(Rc::from(name), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    /// Look up a possibly qualified name such as `math::pi`.
    ///
    /// The longest defined prefix wins; remaining segments are walked as
    /// exports of modules and types.
    pub fn resolve(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.get(path) {
            return Some(value);
        }
        let segments: Vec<&str> = path.split("::").collect();
        for split in (1..segments.len()).rev() {
            let prefix = segments[..split].join("::");
            let Some(mut current) = self.get(&prefix) else {
                continue;
            };
            for segment in &segments[split..] {
                current = current.member(segment)?;
            }
            return Some(current);
        }
        None
    }

    pub fn names(&self) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = self.values.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self::new()
    }
}
