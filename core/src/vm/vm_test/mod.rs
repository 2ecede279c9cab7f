//! End-to-end interpreter tests driven by hand-assembled programs.
//!
//! Code is written as a list of instructions (`[opcode, line, operands...]`)
//! interleaved with `"label:"` markers; operands of the form `"@label"` are
//! replaced by the label's flat offset.

pub(super) use anyhow::{Result, anyhow, bail};
pub(super) use serde_json::{Value as Json, json};

pub(super) use crate::rt::Runtime;
pub(super) use crate::val::error::kind;
pub(super) use crate::val::{Dereferenceable, Value};
pub(super) use crate::vm::{BYTECODE_VERSION, decode_program, encode_closure};

use rustc_hash::FxHashMap;

mod closures;
mod control_flow;
mod debug;
mod decode;
mod exceptions;
mod generators;

const SWITCH: u64 = 50;

pub(super) struct Assembled {
    pub code: Json,
    pub labels: FxHashMap<String, usize>,
}

pub(super) fn assemble(items: &[Json]) -> Result<Assembled> {
    let mut labels = FxHashMap::default();
    let mut offset = 0;
    for item in items {
        match item {
            Json::String(label) => {
                let name = label
                    .strip_suffix(':')
                    .ok_or_else(|| anyhow!("label {label:?} must end with ':'"))?;
                labels.insert(name.to_string(), offset);
            }
            Json::Array(inst) => offset += inst.len(),
            other => bail!("unexpected assembler item {other}"),
        }
    }
    let lookup = |operand: &Json| -> Result<Json> {
        match operand {
            Json::String(s) if s.starts_with('@') => labels
                .get(&s[1..])
                .map(|offset| json!(offset))
                .ok_or_else(|| anyhow!("undefined label {s}")),
            other => Ok(other.clone()),
        }
    };
    let mut code = Vec::with_capacity(offset);
    for item in items {
        let Json::Array(inst) = item else {
            continue;
        };
        let is_switch = inst.first().and_then(Json::as_u64) == Some(SWITCH);
        for (position, operand) in inst.iter().enumerate() {
            let operand = match operand {
                Json::Array(targets) if is_switch && position == 2 => {
                    Json::Array(targets.iter().map(&lookup).collect::<Result<_>>()?)
                }
                _ if position >= 2 => lookup(operand)?,
                _ => operand.clone(),
            };
            code.push(operand);
        }
    }
    Ok(Assembled {
        code: Json::Array(code),
        labels,
    })
}

/// A closure body under construction.
pub(super) struct Block {
    source: &'static str,
    line: u32,
    params: Vec<&'static str>,
    upvalues: usize,
    extra: bool,
    named: bool,
    code: Vec<Json>,
}

impl Block {
    pub(super) fn new(source: &'static str, code: Vec<Json>) -> Self {
        Self {
            source,
            line: 1,
            params: Vec::new(),
            upvalues: 0,
            extra: false,
            named: false,
            code,
        }
    }

    pub(super) fn params(mut self, params: &[&'static str]) -> Self {
        self.params = params.to_vec();
        self
    }

    pub(super) fn upvalues(mut self, count: usize) -> Self {
        self.upvalues = count;
        self
    }

    /// The last parameter collects surplus positional arguments.
    pub(super) fn extra(mut self) -> Self {
        self.extra = true;
        self
    }

    /// The last parameter collects unknown named arguments.
    pub(super) fn named(mut self) -> Self {
        self.named = true;
        self
    }

    /// Closure info block. A trailing `RETURN` labelled `exit` serves as
    /// the default error handler.
    pub(super) fn info(&self) -> Result<Json> {
        self.info_with_version(BYTECODE_VERSION)
    }

    pub(super) fn info_with_version(&self, version: i64) -> Result<Json> {
        let mut items = self.code.clone();
        items.push(json!("exit:"));
        items.push(json!([0, 0]));
        let Assembled { code, labels } = assemble(&items)?;
        let entry = labels.get("entry").copied().unwrap_or(0);
        let handler = labels.get("exit").copied().unwrap_or(0);
        Ok(json!([
            "!",
            version,
            self.source,
            self.line,
            self.params.len(),
            self.upvalues,
            self.extra,
            self.named,
            self.params,
            entry,
            handler,
            [],
            code
        ]))
    }

    pub(super) fn closure(&self, upvalues: Vec<Json>) -> Result<Json> {
        let mut items = vec![json!("z"), self.info()?];
        items.extend(upvalues);
        Ok(Json::Array(items))
    }

    /// A closure whose first upvalue is the closure itself.
    pub(super) fn recursive(&self) -> Result<Json> {
        Ok(json!([0, "closure", self.info()?, [0]]))
    }
}

pub(super) fn method(name: &str) -> Json {
    json!([":", name])
}

pub(super) fn global(name: &str) -> Json {
    json!(["^", name])
}

fn int_pair(args: &[Value]) -> (i64, i64) {
    (args[0].as_int().unwrap_or(0), args[1].as_int().unwrap_or(0))
}

/// Runtime with the handful of natives the test programs call.
pub(super) fn runtime() -> Runtime {
    let rt = Runtime::new();
    {
        let b = rt.builtins();
        let ints = [b.integer.clone(), b.integer.clone()];
        rt.define_method("+", &ints, false, Value::native_sync("+", |_, args| {
            let (a, b) = int_pair(args);
            Value::Integer(a + b)
        }));
        rt.define_method("-", &ints, false, Value::native_sync("-", |_, args| {
            let (a, b) = int_pair(args);
            Value::Integer(a - b)
        }));
        rt.define_method("*", &ints, false, Value::native_sync("*", |_, args| {
            let (a, b) = int_pair(args);
            Value::Integer(a * b)
        }));
        rt.define_method("<", &ints, false, Value::native_sync("<", |_, args| {
            let (a, b) = int_pair(args);
            Value::truth(a < b)
        }));
        rt.define_method("=", &ints, false, Value::native_sync("=", |_, args| {
            let (a, b) = int_pair(args);
            Value::truth(a == b)
        }));
    }
    rt.globals().define(
        "raise",
        Value::native_sync("raise", |_, args| {
            let kind = args.first().and_then(Value::as_str).unwrap_or(kind::VALUE_ERROR);
            let message = args.get(1).map(Value::to_string).unwrap_or_default();
            Value::error(kind, message)
        }),
    );
    rt.globals().define("list", Value::native_sync("list", |_, args| Value::list(args.to_vec())));
    rt.globals().define(
        "push",
        Value::native_sync("push", |_, args| {
            if let Some(Value::List(items)) = args.get(1) {
                items.borrow_mut().push(args[0].clone());
            }
            args.get(1).cloned().unwrap_or(Value::Nil)
        }),
    );
    rt
}

pub(super) fn run(rt: &Runtime, program: &Json, args: Vec<Value>) -> Result<Value> {
    let func = decode_program(rt, program)?;
    rt.run(func, args)
}

pub(super) fn expect_error(value: &Value) -> Result<std::rc::Rc<crate::val::ErrorValue>> {
    match value {
        Value::Error(err) => Ok(err.clone()),
        other => bail!("expected an error, got {other:?}"),
    }
}
