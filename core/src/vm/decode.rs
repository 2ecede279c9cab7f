//! Program loader for the JSON array form.
//!
//! Values are either plain JSON scalars or arrays whose first element is a
//! tag. A numeric tag with a kind (`[7, "list", ...]`) defines a shared
//! node; a bare `[7]` refers back to it, which is how sharing and cycles
//! are expressed.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail, ensure};
use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::Value as Json;

use crate::rt::Runtime;
use crate::val::{ArrayKind, ArrayValue, MapValue, Value};
use crate::vm::closure::{Closure, ClosureInfo};
use crate::vm::opcode::{Inst, Op, Opcode};

pub const BYTECODE_VERSION: i64 = 3;

/// Decode a whole program. The top level is usually a closure.
pub fn decode_program(rt: &Runtime, json: &Json) -> Result<Value> {
    Decoder::new(rt).decode(json)
}

pub fn decode_str(rt: &Runtime, text: &str) -> Result<Value> {
    let json: Json = serde_json::from_str(text).context("program is not valid JSON")?;
    decode_program(rt, &json)
}

pub struct Decoder<'rt> {
    rt: &'rt Runtime,
    cache: FxHashMap<i64, Value>,
}

fn as_int(json: &Json, what: &str) -> Result<i64> {
    json.as_i64()
        .ok_or_else(|| anyhow!("expected integer for {what}, found {json}"))
}

fn as_usize(json: &Json, what: &str) -> Result<usize> {
    let value = as_int(json, what)?;
    usize::try_from(value).map_err(|_| anyhow!("{what} must not be negative, found {value}"))
}

fn as_str<'a>(json: &'a Json, what: &str) -> Result<&'a str> {
    json.as_str()
        .ok_or_else(|| anyhow!("expected string for {what}, found {json}"))
}

fn as_array<'a>(json: &'a Json, what: &str) -> Result<&'a [Json]> {
    json.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| anyhow!("expected array for {what}, found {json}"))
}

fn as_flag(json: &Json, what: &str) -> Result<bool> {
    match json {
        Json::Bool(flag) => Ok(*flag),
        Json::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
        Json::Null => Ok(false),
        other => bail!("expected flag for {what}, found {other}"),
    }
}

fn names(json: &Json, what: &str) -> Result<Vec<Rc<str>>> {
    as_array(json, what)?
        .iter()
        .map(|name| as_str(name, what).map(Rc::from))
        .collect()
}

/// Flags such as case folding travel inline in the pattern (`(?i)...`).
fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("invalid regex {pattern:?}"))
}

/// Cursor over one flat code array.
struct CodeReader<'a> {
    items: &'a [Json],
    pos: usize,
}

impl<'a> CodeReader<'a> {
    fn next(&mut self, what: &str) -> Result<&'a Json> {
        let item = self
            .items
            .get(self.pos)
            .ok_or_else(|| anyhow!("code ended while reading {what} at offset {}", self.pos))?;
        self.pos += 1;
        Ok(item)
    }

    fn int(&mut self, what: &str) -> Result<i64> {
        as_int(self.next(what)?, what)
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        as_usize(self.next(what)?, what)
    }
}

impl<'rt> Decoder<'rt> {
    pub fn new(rt: &'rt Runtime) -> Self {
        Self {
            rt,
            cache: FxHashMap::default(),
        }
    }

    pub fn decode(&mut self, json: &Json) -> Result<Value> {
        match json {
            Json::Null => Ok(Value::Nil),
            Json::Bool(flag) => Ok(Value::Boolean(*flag)),
            Json::Number(n) => Ok(match n.as_i64() {
                Some(int) => Value::Integer(int),
                None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Json::String(s) => Ok(Value::string(s)),
            Json::Array(items) => match items.first() {
                Some(Json::Number(tag)) => {
                    let tag = tag.as_i64().ok_or_else(|| anyhow!("reference tag must be an integer"))?;
                    self.decode_tagged(tag, &items[1..])
                }
                Some(Json::String(kind)) => self.decode_kind(kind, &items[1..]),
                Some(other) => bail!("unsupported value tag {other}"),
                None => bail!("empty array is not a value"),
            },
            Json::Object(_) => bail!("objects are not part of the program format"),
        }
    }

    fn decode_all(&mut self, items: &[Json]) -> Result<Vec<Value>> {
        items.iter().map(|item| self.decode(item)).collect()
    }

    fn decode_tagged(&mut self, tag: i64, rest: &[Json]) -> Result<Value> {
        let Some(kind) = rest.first() else {
            return self
                .cache
                .get(&tag)
                .cloned()
                .ok_or_else(|| anyhow!("reference to undefined tag {tag}"));
        };
        let kind = as_str(kind, "reference kind")?;
        let body = &rest[1..];
        match kind {
            "list" => {
                let list = Rc::new(RefCell::new(Vec::with_capacity(body.len())));
                self.cache.insert(tag, Value::List(list.clone()));
                for item in body {
                    let value = self.decode(item)?;
                    list.borrow_mut().push(value);
                }
                Ok(Value::List(list))
            }
            "map" => {
                let map = MapValue::new();
                self.cache.insert(tag, Value::Map(map.clone()));
                self.fill_map(&map, body)?;
                Ok(Value::Map(map))
            }
            "global" | "variable" | "var" => {
                let cell = Rc::new(RefCell::new(Value::Nil));
                let value = if kind == "global" {
                    Value::Global(cell.clone())
                } else {
                    Value::Variable(cell.clone())
                };
                self.cache.insert(tag, value.clone());
                if let Some(inner) = body.first() {
                    *cell.borrow_mut() = self.decode(inner)?;
                }
                Ok(value)
            }
            "closure" | "z" => {
                let info = body.first().ok_or_else(|| anyhow!("closure {tag} has no info block"))?;
                let info = self.decode_info_json(info)?;
                let closure = Closure::new(info, Vec::new());
                self.cache.insert(tag, Value::Closure(closure.clone()));
                for item in &body[1..] {
                    let value = self.decode(item)?;
                    closure.upvalues().borrow_mut().push(value);
                }
                Ok(Value::Closure(closure))
            }
            other => bail!("unknown reference kind {other:?}"),
        }
    }

    fn fill_map(&mut self, map: &MapValue, body: &[Json]) -> Result<()> {
        ensure!(body.len() % 2 == 0, "map entries must come in key/value pairs");
        for pair in body.chunks(2) {
            let key = self.decode(&pair[0])?;
            let value = self.decode(&pair[1])?;
            map.insert(key, value);
        }
        Ok(())
    }

    fn decode_kind(&mut self, kind: &str, body: &[Json]) -> Result<Value> {
        match kind {
            "_" | "blank" => Ok(Value::Blank),
            "some" => Ok(Value::Some),
            "r" | "regex" => {
                let pattern = as_str(body.first().unwrap_or(&Json::Null), "regex pattern")?;
                Ok(Value::Regex(Rc::new(compile_regex(pattern)?)))
            }
            ":" | "method" => {
                let name = as_str(body.first().unwrap_or(&Json::Null), "method name")?;
                Ok(Value::Method(self.rt.method(name)))
            }
            "t" | "tuple" => Ok(Value::tuple(self.decode_all(body)?)),
            "l" | "list" => Ok(Value::list(self.decode_all(body)?)),
            "n" | "names" => {
                let names = body
                    .iter()
                    .map(|name| match name {
                        Json::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>();
                Ok(Value::names(names))
            }
            "m" | "map" => {
                let map = MapValue::new();
                self.fill_map(&map, body)?;
                Ok(Value::Map(map))
            }
            "global" => {
                let inner = body.first().map(|item| self.decode(item)).transpose()?;
                Ok(Value::global(inner.unwrap_or(Value::Nil)))
            }
            "var" | "variable" => {
                let inner = body.first().map(|item| self.decode(item)).transpose()?;
                Ok(Value::variable(inner.unwrap_or(Value::Nil)))
            }
            "z" | "closure" => {
                let info = body.first().ok_or_else(|| anyhow!("closure has no info block"))?;
                let info = self.decode_info_json(info)?;
                let upvalues = self.decode_all(&body[1..])?;
                Ok(Value::Closure(Closure::new(info, upvalues)))
            }
            "!" => bail!("a bare info block is not a value; wrap it in a closure"),
            "^" => {
                let name = as_str(body.first().unwrap_or(&Json::Null), "global name")?;
                self.rt
                    .globals()
                    .resolve(name)
                    .ok_or_else(|| anyhow!("unknown global {name:?}"))
            }
            "array" => self.decode_array(body),
            "o" | "object" => {
                let key = as_str(body.first().unwrap_or(&Json::Null), "object key")?;
                let constructor = self
                    .rt
                    .objects()
                    .get(key)
                    .ok_or_else(|| anyhow!("unknown object constructor {key:?}"))?;
                let args = self.decode_all(&body[1..])?;
                constructor(self.rt, args).with_context(|| format!("building object {key:?}"))
            }
            other => bail!("unknown value tag {other:?}"),
        }
    }

    fn decode_array(&mut self, body: &[Json]) -> Result<Value> {
        ensure!(body.len() == 3, "array needs kind, shape and values");
        let kind_name = as_str(&body[0], "array kind")?;
        let kind = ArrayKind::from_name(kind_name)
            .ok_or_else(|| anyhow!("ArrayError: unknown array kind {kind_name:?}"))?;
        let shape = as_array(&body[1], "array shape")?
            .iter()
            .map(|dim| as_usize(dim, "array dimension"))
            .collect::<Result<Vec<_>>>()?;
        let values = self.decode_all(as_array(&body[2], "array values")?)?;
        let array = ArrayValue::from_values(kind, shape, &values).context("ValueError")?;
        Ok(Value::Array(Rc::new(array)))
    }

    fn decode_info_json(&mut self, json: &Json) -> Result<Rc<ClosureInfo>> {
        let items = as_array(json, "closure info")?;
        ensure!(
            items.first().and_then(Json::as_str) == Some("!"),
            "closure info must start with \"!\""
        );
        self.decode_info(&items[1..])
    }

    fn decode_info(&mut self, items: &[Json]) -> Result<Rc<ClosureInfo>> {
        ensure!(items.len() == 12, "closure info has {} fields, expected 12", items.len());
        let version = as_int(&items[0], "bytecode version")?;
        ensure!(
            version == BYTECODE_VERSION,
            "bytecode version mismatch: found {version}, expected {BYTECODE_VERSION}"
        );
        let source: Rc<str> = Rc::from(as_str(&items[1], "source")?);
        let line = u32::try_from(as_int(&items[2], "line")?).context("line out of range")?;
        let param_count = as_usize(&items[3], "parameter count")?;
        let upvalue_count = as_usize(&items[4], "upvalue count")?;
        let extra_args = as_flag(&items[5], "extra args")?;
        let named_args = as_flag(&items[6], "named args")?;
        ensure!(
            param_count >= usize::from(extra_args) + usize::from(named_args),
            "parameter count {param_count} too small for its collectors"
        );
        let params = names(&items[7], "parameter names")?;
        let entry = as_usize(&items[8], "entry offset")?;
        let handler = as_usize(&items[9], "handler offset")?;
        let decls = names(&items[10], "declaration names")?;
        let flat = as_array(&items[11], "code")?;
        let (code, index_of) = self.decode_code(flat)?;
        let lookup = |offset: usize, what: &str| {
            index_of
                .get(&offset)
                .copied()
                .ok_or_else(|| anyhow!("{what} {offset} is not an instruction boundary"))
        };
        let entry = lookup(entry, "entry offset")?;
        let handler = lookup(handler, "handler offset")?;
        tracing::debug!(
            target: "kestrel::load",
            source = %source,
            line,
            instructions = code.len(),
            "decoded closure info"
        );
        Ok(Rc::new(ClosureInfo {
            source,
            line,
            param_count,
            upvalue_count,
            extra_args,
            named_args,
            params,
            entry,
            handler,
            decls,
            code,
        }))
    }

    /// Decode instructions and translate flat offsets to instruction indices.
    fn decode_code(&mut self, flat: &[Json]) -> Result<(Vec<Inst>, FxHashMap<usize, usize>)> {
        let mut reader = CodeReader { items: flat, pos: 0 };
        let mut code = Vec::new();
        let mut index_of = FxHashMap::default();
        while reader.pos < flat.len() {
            index_of.insert(reader.pos, code.len());
            let start = reader.pos;
            let raw = reader.int("opcode")?;
            let opcode = u8::try_from(raw)
                .ok()
                .and_then(Opcode::from_u8)
                .ok_or_else(|| anyhow!("unknown opcode {raw} at offset {start}"))?;
            let line = u32::try_from(reader.int("line")?).context("line out of range")?;
            let op = self
                .decode_op(opcode, &mut reader)
                .with_context(|| format!("decoding {opcode:?} at offset {start}"))?;
            code.push(Inst { line, op });
        }
        index_of.insert(flat.len(), code.len());
        for inst in &mut code {
            for target in inst.op.targets_mut() {
                *target = *index_of
                    .get(target)
                    .ok_or_else(|| anyhow!("jump target {} is not an instruction boundary", target))?;
            }
        }
        Ok((code, index_of))
    }

    fn decode_op(&mut self, opcode: Opcode, reader: &mut CodeReader<'_>) -> Result<Op> {
        let op = match opcode {
            Opcode::Return => Op::Return,
            Opcode::Suspend => Op::Suspend,
            Opcode::Resume => Op::Resume,
            Opcode::Nil => Op::Nil,
            Opcode::NilPush => Op::NilPush,
            Opcode::Some => Op::Some,
            Opcode::And => Op::And(reader.count("target")?),
            Opcode::Or => Op::Or(reader.count("target")?),
            Opcode::Not => Op::Not,
            Opcode::Push => Op::Push,
            Opcode::Pop => Op::Pop,
            Opcode::Load => Op::Load(self.decode(reader.next("value")?)?),
            Opcode::LoadPush => Op::LoadPush(self.decode(reader.next("value")?)?),
            Opcode::Enter => Op::Enter {
                vars: reader.count("vars")?,
                lets: reader.count("lets")?,
            },
            Opcode::Exit => Op::Exit(reader.count("count")?),
            Opcode::Goto => Op::Goto(reader.count("target")?),
            Opcode::Try => Op::Try(reader.count("target")?),
            Opcode::Catch => Op::Catch {
                handler: reader.count("handler")?,
                depth: reader.count("depth")?,
            },
            Opcode::CatchX => Op::CatchX {
                handler: reader.count("handler")?,
                depth: reader.count("depth")?,
            },
            Opcode::CatchType => Op::CatchType {
                next: reader.count("target")?,
                kinds: names(reader.next("kinds")?, "error kinds")?,
            },
            Opcode::Retry => Op::Retry,
            Opcode::Local => Op::Local(reader.count("index")?),
            Opcode::LocalPush => Op::LocalPush(reader.count("index")?),
            Opcode::LocalI => Op::LocalI {
                slot: reader.count("index")?,
                name: Rc::from(as_str(reader.next("name")?, "name")?),
            },
            Opcode::Upvalue => Op::Upvalue(reader.count("index")?),
            Opcode::Var => Op::Var(reader.count("index")?),
            Opcode::VarX => Op::VarX {
                slot: reader.count("index")?,
                count: reader.count("count")?,
            },
            Opcode::Let => Op::Let(reader.count("index")?),
            Opcode::LetI => Op::LetI(reader.count("index")?),
            Opcode::LetX => Op::LetX {
                slot: reader.count("index")?,
                count: reader.count("count")?,
            },
            Opcode::Assign => Op::Assign,
            Opcode::AssignLocal => Op::AssignLocal(reader.count("index")?),
            Opcode::Call => Op::Call(reader.count("count")?),
            Opcode::CallConst => Op::CallConst {
                func: self.decode(reader.next("function")?)?,
                count: reader.count("count")?,
            },
            Opcode::TailCall => Op::TailCall(reader.count("count")?),
            Opcode::TailCallConst => Op::TailCallConst {
                func: self.decode(reader.next("function")?)?,
                count: reader.count("count")?,
            },
            Opcode::For => Op::For,
            Opcode::Iter => Op::Iter(reader.count("target")?),
            Opcode::Next => Op::Next(reader.count("target")?),
            Opcode::Key => Op::Key,
            Opcode::Value1 => Op::Value1,
            Opcode::Value2 => Op::Value2,
            Opcode::ListNew => Op::ListNew,
            Opcode::ListAppend => Op::ListAppend,
            Opcode::MapNew => Op::MapNew,
            Opcode::MapInsert => Op::MapInsert,
            Opcode::TupleNew => Op::TupleNew(reader.count("count")?),
            Opcode::PartialNew => Op::PartialNew(reader.count("count")?),
            Opcode::PartialSet => Op::PartialSet(reader.count("index")?),
            Opcode::Closure => {
                let info = self.decode_info_json(reader.next("closure info")?)?;
                let captures = (0..info.upvalue_count)
                    .map(|_| reader.int("upvalue index"))
                    .collect::<Result<Vec<_>>>()?;
                Op::Closure { info, captures }
            }
            Opcode::Switch => {
                let targets = as_array(reader.next("targets")?, "switch targets")?
                    .iter()
                    .map(|target| as_usize(target, "switch target"))
                    .collect::<Result<Vec<_>>>()?;
                ensure!(!targets.is_empty(), "switch needs at least one target");
                Op::Switch(targets)
            }
            Opcode::Resolve => Op::Resolve(self.decode(reader.next("name")?)?),
            Opcode::StringNew => Op::StringNew,
            Opcode::StringAdd => Op::StringAdd(reader.count("count")?),
            Opcode::StringAdds => Op::StringAdds(Rc::from(as_str(reader.next("string")?, "string")?)),
            Opcode::StringEnd => Op::StringEnd,
        };
        Ok(op)
    }
}
