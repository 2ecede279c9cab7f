//! Prelude for kestrel programs.
//!
//! Every method and global here is defined through the runtime's public
//! surface (method definitions, `schedule`, `call` and the iteration
//! protocol), the same way an embedder would extend the language.

pub mod chain;
pub mod error;
pub mod io;
pub mod iter;
pub mod list;
pub mod map;
pub mod module;
pub mod number;
pub mod string;


use anyhow::{Result, ensure};
use kestrel_core::{Runtime, Value};

/// Register all prelude methods, constructors, globals and modules.
///
/// Fails when one of the prelude's globals is already defined, which
/// usually means the prelude was registered twice.
pub fn register_prelude(rt: &Runtime) -> Result<()> {
    number::register(rt);
    string::register(rt);
    list::register(rt);
    map::register(rt);
    chain::register(rt)?;
    error::register(rt)?;
    iter::register(rt);
    io::register(rt)?;
    module::register(rt)?;
    tracing::debug!(target: "kestrel::stdlib", globals = rt.globals().names().len(), "prelude registered");
    Ok(())
}

/// Define a prelude global, refusing to shadow an existing one.
pub(crate) fn define_global(rt: &Runtime, name: &str, value: Value) -> Result<()> {
    ensure!(!rt.globals().contains(name), "global {name} is already defined");
    rt.globals().define(name, value);
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use anyhow::{Result, anyhow};
    use kestrel_core::{Runtime, Value};

    pub fn prelude() -> Result<Runtime> {
        let rt = Runtime::new();
        crate::register_prelude(&rt)?;
        Ok(rt)
    }

    /// Call a method by name from host code.
    pub fn call(rt: &Runtime, name: &str, args: Vec<Value>) -> Result<Value> {
        rt.run(Value::Method(rt.method(name)), args)
    }

    pub fn call_global(rt: &Runtime, name: &str, args: Vec<Value>) -> Result<Value> {
        let func = rt.globals().resolve(name).ok_or_else(|| anyhow!("no global {name}"))?;
        rt.run(func, args)
    }

    pub fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|n| Value::Integer(*n)).collect()
    }
}
