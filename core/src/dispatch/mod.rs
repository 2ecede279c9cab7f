//! Multiple dispatch and the generic call path.

use std::fmt::Write as _;
use std::rc::Rc;

use crate::rt::{Caller, Runtime};
use crate::val::error::kind;
use crate::val::{Dereferenceable, Type, Value};

mod call;
mod method;


pub use call::Callable;
pub(crate) use call::call_now;
pub use method::{Definition, Method, MethodRegistry};

/// Resolve `method` against the runtime types of `args` and call the winner.
pub fn invoke_method(rt: &Runtime, caller: Caller, method: &Rc<Method>, args: Vec<Value>) {
    let args: Vec<Value> = args.iter().map(Dereferenceable::deref_value).collect();
    if let Some(error) = args.iter().find(|arg| arg.is_error()) {
        rt.resume(caller, error.clone());
        return;
    }
    let types: Vec<Rc<Type>> = args.iter().map(|arg| rt.type_of(arg)).collect();
    match method.resolve(&types) {
        Some(func) => call_now(rt, caller, func, args),
        None => {
            let signature: Vec<&str> = types.iter().map(|ty| ty.name()).collect();
            let message = format!("no method found for {}({})", method.name(), signature.join(", "));
            tracing::debug!(target: "kestrel::dispatch", %message, "dispatch failed");
            rt.resume(caller, Value::error(kind::METHOD_ERROR, message));
        }
    }
}

/// Methods the instruction set itself relies on.
pub(crate) fn register_core_methods(rt: &Runtime) {
    let builtins = rt.builtins();

    rt.define_constructor(
        &builtins.type_,
        &[builtins.any.clone()],
        false,
        Value::native_sync("type::of", |rt, args| Value::Type(rt.type_of(&args[0]))),
    );

    rt.define_method(
        "::",
        &[builtins.any.clone(), builtins.string.clone()],
        false,
        Value::native_sync("::", |_, args| {
            let name = args[1].as_str().unwrap_or_default();
            args[0].member(name).unwrap_or_else(|| {
                Value::error(
                    kind::NAME_ERROR,
                    format!("{} has no member named {}", args[0].kind_name(), name),
                )
            })
        }),
    );

    rt.define_method(
        "append",
        &[builtins.string_buffer.clone()],
        true,
        Value::native_sync("append", |_, args| {
            if let Value::StringBuffer(buffer) = &args[0] {
                let mut buffer = buffer.borrow_mut();
                for value in &args[1..] {
                    let _ = write!(buffer, "{value}");
                }
            }
            args[0].clone()
        }),
    );
}
