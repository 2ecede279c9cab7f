use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::val::{Type, Value};

/// Instance of a user-defined type with named fields.
pub struct Object {
    ty: Rc<Type>,
    fields: RefCell<FxHashMap<Rc<str>, Value>>,
}

impl Object {
    pub fn new(ty: Rc<Type>) -> Rc<Self> {
        Rc::new(Self {
            ty,
            fields: RefCell::new(FxHashMap::default()),
        })
    }

    #[inline]
    pub fn ty(&self) -> &Rc<Type> {
        &self.ty
    }

    pub fn field(&self, name: &str) -> Value {
        self.fields.borrow().get(name).cloned().unwrap_or(Value::Nil)
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(Rc::from(name), value);
    }
}

/// Named bag of exports, reachable through `::` paths.
pub struct Module {
    name: Rc<str>,
    exports: RefCell<FxHashMap<Rc<str>, Value>>,
}

impl Module {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from(name),
            exports: RefCell::new(FxHashMap::default()),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn export(&self, name: &str) -> Option<Value> {
        self.exports.borrow().get(name).cloned()
    }

    pub fn set_export(&self, name: &str, value: Value) {
        self.exports.borrow_mut().insert(Rc::from(name), value);
    }

    pub fn export_names(&self) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = self.exports.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Value {
    /// Member lookup shared by globals resolution and the `::` method.
    pub fn member(&self, name: &str) -> Option<Value> {
        match self {
            Value::Module(module) => module.export(name),
            Value::Type(ty) => ty.export(name),
            Value::Object(object) => Some(object.field(name)),
            Value::Global(cell) | Value::Variable(cell) => cell.borrow().member(name),
            _ => None,
        }
    }
}
