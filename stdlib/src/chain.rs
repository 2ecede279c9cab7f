//! Pipeline-building methods.
//!
//! `xs -> f`, `xs => k, v`, `xs ->? p` and `xs =>? p` each return a chained
//! function; applying another one to a chain extends it instead of nesting.

use anyhow::Result;
use kestrel_core::iter::chain::{
    ChainStep, Chained, DUO_MARKER, FILTER_DUO_MARKER, FILTER_MARKER, MAP_MARKER,
};
use kestrel_core::{Runtime, Value};

use crate::define_global;

/// Append `step` to `base`, starting a new chain unless `base` already is one.
pub fn extend(base: &Value, step: ChainStep) -> Value {
    match base {
        Value::Chained(chain) => Value::Chained(chain.then(step)),
        other => Value::Chained(Chained::new(other.clone(), vec![step])),
    }
}

fn define_step(rt: &Runtime, marker: &'static str, arity: usize, build: fn(&[Value]) -> ChainStep) {
    let types = vec![rt.builtins().any.clone(); arity + 1];
    rt.define_method(
        marker,
        &types,
        false,
        Value::native_sync(marker, move |_, args| extend(&args[0], build(&args[1..]))),
    );
}

pub fn register(rt: &Runtime) -> Result<()> {
    define_step(rt, MAP_MARKER, 1, |args| ChainStep::Map(args[0].clone()));
    define_step(rt, DUO_MARKER, 2, |args| ChainStep::Duo {
        key: args[0].clone(),
        value: args[1].clone(),
    });
    define_step(rt, FILTER_MARKER, 1, |args| ChainStep::Filter(args[0].clone()));
    define_step(rt, FILTER_DUO_MARKER, 1, |args| ChainStep::FilterDuo(args[0].clone()));

    // chain(base, f, :->?, p, ...) from a flat entry list.
    define_global(
        rt,
        "chain",
        Value::native_sync("chain", |_, args| Chained::from_entries(args.to_vec())),
    )?;
    Ok(())
}

/// Number of steps on a chain, zero for anything else.
pub fn step_count(value: &Value) -> usize {
    match value {
        Value::Chained(chain) => chain.steps().len(),
        _ => 0,
    }
}

