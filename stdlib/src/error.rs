//! Inspecting caught errors and raising new ones.

use anyhow::Result;
use kestrel_core::val::error::kind;
use kestrel_core::{Runtime, Value};

use crate::define_global;

pub fn register(rt: &Runtime) -> Result<()> {
    let error_value = rt.builtins().error_value.clone();

    rt.define_method(
        "kind",
        &[error_value.clone()],
        false,
        Value::native_sync("kind", |_, args| match &args[0] {
            Value::ErrorValue(err) => Value::from(err.kind()),
            _ => Value::Nil,
        }),
    );
    rt.define_method(
        "message",
        &[error_value.clone()],
        false,
        Value::native_sync("message", |_, args| match &args[0] {
            Value::ErrorValue(err) => Value::from(err.message()),
            _ => Value::Nil,
        }),
    );
    // Innermost frame first, as "source:line".
    rt.define_method(
        "trace",
        &[error_value.clone()],
        false,
        Value::native_sync("trace", |_, args| match &args[0] {
            Value::ErrorValue(err) => Value::list(
                err.trace()
                    .iter()
                    .map(|entry| Value::from(format!("{}:{}", entry.source, entry.line)))
                    .collect(),
            ),
            _ => Value::Nil,
        }),
    );
    // Put a caught error back in flight; its trace keeps growing from here.
    rt.define_method(
        "rethrow",
        &[error_value],
        false,
        Value::native_sync("rethrow", |_, args| match &args[0] {
            Value::ErrorValue(err) => Value::Error(err.clone()),
            other => other.clone(),
        }),
    );

    define_global(
        rt,
        "raise",
        Value::native_sync("raise", |_, args| {
            let (name, message) = match args {
                [] => (kind::VALUE_ERROR, String::new()),
                [message] => (kind::VALUE_ERROR, message.to_string()),
                [name, message, ..] => (name.as_str().unwrap_or(kind::VALUE_ERROR), message.to_string()),
            };
            Value::error(name, message)
        }),
    )
}
