use std::rc::Rc;

use crate::dispatch::{Method, invoke_method};
use crate::rt::{Caller, Runtime};
use crate::val::error::kind;
use crate::val::{Dereferenceable, NativeFunction, Partial, Value};

/// Something that can be applied to arguments.
///
/// Implementations run inside a scheduler task and must hand their result
/// to `caller` exactly once, either directly or by scheduling more work.
pub trait Callable {
    fn call(&self, rt: &Runtime, caller: Caller, args: Vec<Value>);
}

impl Callable for Rc<NativeFunction> {
    fn call(&self, rt: &Runtime, caller: Caller, args: Vec<Value>) {
        let args = args.iter().map(Dereferenceable::deref_value).collect();
        self.invoke(rt, caller, args);
    }
}

impl Callable for Rc<Method> {
    fn call(&self, rt: &Runtime, caller: Caller, args: Vec<Value>) {
        invoke_method(rt, caller, self, args);
    }
}

impl Callable for Rc<Partial> {
    fn call(&self, rt: &Runtime, caller: Caller, args: Vec<Value>) {
        let combined = self.combine(args);
        call_now(rt, caller, self.func().clone(), combined);
    }
}

/// An integer used as a function selects one of its arguments.
/// `1` is the first, `-1` the last; out of range yields nil.
fn select_argument(rt: &Runtime, caller: Caller, index: i64, args: Vec<Value>) {
    let len = args.len() as i64;
    let position = if index < 0 { len + index } else { index - 1 };
    let value = if (0..len).contains(&position) {
        args[position as usize].deref_value()
    } else {
        Value::Nil
    };
    rt.resume(caller, value);
}

impl Callable for Value {
    fn call(&self, rt: &Runtime, caller: Caller, args: Vec<Value>) {
        match self {
            Value::Closure(closure) => closure.call(rt, caller, args),
            Value::Native(native) => native.call(rt, caller, args),
            Value::Method(method) => method.call(rt, caller, args),
            Value::Type(ty) => invoke_method(rt, caller, &ty.constructor(), args),
            Value::Partial(partial) => partial.call(rt, caller, args),
            Value::Frame(frame) => frame.call(rt, caller, args),
            Value::Chained(chain) => chain.call(rt, caller, args),
            Value::Integer(index) => select_argument(rt, caller, *index, args),
            Value::Variable(_)
            | Value::Global(_)
            | Value::ListSlot { .. }
            | Value::MapNode(_)
            | Value::MapIndex(_) => self.deref_value().call(rt, caller, args),
            Value::Error(_) => rt.resume(caller, self.clone()),
            Value::Uninitialized(placeholder) => rt.resume(
                caller,
                Value::error(
                    kind::NAME_ERROR,
                    format!("{} called before it was defined", placeholder.name()),
                ),
            ),
            other => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(other.clone());
                full.extend(args);
                invoke_method(rt, caller, &rt.method("()"), full);
            }
        }
    }
}

/// Apply `func` within the current task.
#[inline]
pub(crate) fn call_now(rt: &Runtime, caller: Caller, func: Value, args: Vec<Value>) {
    func.call(rt, caller, args);
}
