use std::fmt;
use std::rc::Rc;

use crate::rt::{Caller, Runtime};
use crate::val::Value;

/// Host function signature. Arguments arrive already dereferenced; the
/// implementation must eventually resume `caller` exactly once.
pub type NativeFn = dyn Fn(&Runtime, Caller, Vec<Value>);

pub struct NativeFunction {
    name: Rc<str>,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(name: &str, func: impl Fn(&Runtime, Caller, Vec<Value>) + 'static) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from(name),
            func: Box::new(func),
        })
    }

    /// Wrap a function that produces its result immediately.
    pub fn sync(name: &str, func: impl Fn(&Runtime, &[Value]) -> Value + 'static) -> Rc<Self> {
        Self::new(name, move |rt, caller, args| {
            let result = func(rt, &args);
            rt.resume(caller, result);
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn invoke(&self, rt: &Runtime, caller: Caller, args: Vec<Value>) {
        (self.func)(rt, caller, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl Value {
    pub fn native(name: &str, func: impl Fn(&Runtime, Caller, Vec<Value>) + 'static) -> Value {
        Value::Native(NativeFunction::new(name, func))
    }

    pub fn native_sync(name: &str, func: impl Fn(&Runtime, &[Value]) -> Value + 'static) -> Value {
        Value::Native(NativeFunction::sync(name, func))
    }
}
