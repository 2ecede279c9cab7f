//! Modules and `::` member lookup.
//!
//! The runtime already resolves `::` on modules, types and objects; the
//! prelude adds maps (string keys) and publishes a `math` module whose
//! members load as `math::name` globals.

use anyhow::Result;
use kestrel_core::val::error::kind;
use kestrel_core::val::{Dereferenceable, Module};
use kestrel_core::{Runtime, Value};

use crate::define_global;

fn unary_real(name: &'static str, op: fn(f64) -> f64) -> Value {
    Value::native_sync(name, move |_, args| {
        match args.first().map(Dereferenceable::deref_value).and_then(|arg| arg.as_real()) {
            Some(x) => Value::Real(op(x)),
            None => Value::type_error(format!("{name} expects a number")),
        }
    })
}

fn math_module() -> Value {
    let math = Module::new("math");
    math.set_export("pi", Value::Real(std::f64::consts::PI));
    math.set_export("e", Value::Real(std::f64::consts::E));
    math.set_export("sqrt", unary_real("sqrt", f64::sqrt));
    math.set_export("floor", unary_real("floor", f64::floor));
    math.set_export("ceil", unary_real("ceil", f64::ceil));
    math.set_export("round", unary_real("round", f64::round));
    math.set_export("ln", unary_real("ln", f64::ln));
    Value::Module(math)
}

pub fn register(rt: &Runtime) -> Result<()> {
    let b = rt.builtins();
    rt.define_method(
        "::",
        &[b.map.clone(), b.string.clone()],
        false,
        Value::native_sync("::", |_, args| match &args[0] {
            Value::Map(map) => map.get(&args[1]).unwrap_or_else(|| {
                Value::error(kind::NAME_ERROR, format!("map has no member named {}", args[1]))
            }),
            _ => Value::Nil,
        }),
    );
    rt.define_method(
        "exports",
        &[b.module.clone()],
        false,
        Value::native_sync("exports", |_, args| match &args[0] {
            Value::Module(module) => Value::list(
                module
                    .export_names()
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
            _ => Value::Nil,
        }),
    );
    define_global(rt, "math", math_module())
}
