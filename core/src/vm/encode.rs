//! Serializer producing the array form read by [`decode_program`].
//!
//! Shared lists, maps, globals, variables and closures get a numeric tag
//! the first time they are written and are referenced as `[tag]` after
//! that, so cycles survive a round trip.
//!
//! [`decode_program`]: crate::vm::decode_program

use std::rc::Rc;

use anyhow::{Result, anyhow, bail};
use rustc_hash::FxHashMap;
use serde_json::{Number, Value as Json, json};

use crate::val::Value;
use crate::vm::closure::{Closure, ClosureInfo};
use crate::vm::decode::BYTECODE_VERSION;
use crate::vm::opcode::{Inst, Op};

pub fn encode_closure(closure: &Rc<Closure>) -> Result<Json> {
    Encoder::new().encode(&Value::Closure(closure.clone()))
}

pub fn encode_value(value: &Value) -> Result<Json> {
    Encoder::new().encode(value)
}

#[derive(Default)]
pub struct Encoder {
    tags: FxHashMap<usize, i64>,
    next_tag: i64,
}

fn address<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            tags: FxHashMap::default(),
            next_tag: 0,
        }
    }

    /// Returns the tag and whether this is its first appearance.
    fn tag(&mut self, addr: usize) -> (i64, bool) {
        if let Some(tag) = self.tags.get(&addr) {
            return (*tag, false);
        }
        let tag = self.next_tag;
        self.next_tag += 1;
        self.tags.insert(addr, tag);
        (tag, true)
    }

    pub fn encode(&mut self, value: &Value) -> Result<Json> {
        let json = match value {
            Value::Nil | Value::Unset => Json::Null,
            Value::Some => json!(["some"]),
            Value::Blank => json!(["_"]),
            Value::Boolean(flag) => Json::Bool(*flag),
            Value::Integer(n) => json!(n),
            Value::Real(x) => Number::from_f64(*x)
                .map(Json::Number)
                .ok_or_else(|| anyhow!("cannot encode non-finite real {x}"))?,
            Value::String(s) => Json::String(s.to_string()),
            Value::Regex(regex) => json!(["r", regex.as_str()]),
            Value::Method(method) => json!([":", method.name()]),
            Value::Type(ty) => json!(["^", ty.name()]),
            Value::Native(native) => json!(["^", native.name()]),
            Value::Module(module) => json!(["^", module.name()]),
            Value::Names(names) => {
                let mut items = vec![json!("n")];
                items.extend(names.iter().map(|name| Json::String(name.to_string())));
                Json::Array(items)
            }
            Value::Tuple(items) => {
                let mut out = vec![json!("t")];
                for item in items.iter() {
                    out.push(self.encode(item)?);
                }
                Json::Array(out)
            }
            Value::List(list) => {
                let (tag, fresh) = self.tag(address(list));
                if !fresh {
                    return Ok(json!([tag]));
                }
                let items = list.borrow().clone();
                let mut out = vec![json!(tag), json!("list")];
                for item in &items {
                    out.push(self.encode(item)?);
                }
                Json::Array(out)
            }
            Value::Map(map) => {
                let (tag, fresh) = self.tag(address(map));
                if !fresh {
                    return Ok(json!([tag]));
                }
                let mut out = vec![json!(tag), json!("map")];
                for node in map.nodes() {
                    out.push(self.encode(node.key())?);
                    out.push(self.encode(&node.value())?);
                }
                Json::Array(out)
            }
            Value::Global(cell) | Value::Variable(cell) => {
                let (tag, fresh) = self.tag(address(cell));
                if !fresh {
                    return Ok(json!([tag]));
                }
                let kind = if matches!(value, Value::Global(_)) { "global" } else { "variable" };
                let inner = cell.borrow().clone();
                json!([tag, kind, self.encode(&inner)?])
            }
            Value::Closure(closure) => {
                let (tag, fresh) = self.tag(address(closure));
                if !fresh {
                    return Ok(json!([tag]));
                }
                let mut out = vec![json!(tag), json!("closure"), self.encode_info(closure.info())?];
                let upvalues = closure.upvalues().borrow().clone();
                for upvalue in &upvalues {
                    out.push(self.encode(upvalue)?);
                }
                Json::Array(out)
            }
            Value::Array(array) => {
                let values = array
                    .values()
                    .iter()
                    .map(|item| self.encode(item))
                    .collect::<Result<Vec<_>>>()?;
                json!(["array", array.kind().name(), array.shape(), values])
            }
            other => bail!("{} values cannot be serialized", other.kind_name()),
        };
        Ok(json)
    }

    fn encode_info(&mut self, info: &ClosureInfo) -> Result<Json> {
        let mut offsets = Vec::with_capacity(info.code.len() + 1);
        let mut offset = 0;
        for inst in &info.code {
            offsets.push(offset);
            offset += inst.op.encoded_len();
        }
        offsets.push(offset);
        let to_offset = |index: usize| {
            offsets
                .get(index)
                .copied()
                .ok_or_else(|| anyhow!("instruction index {index} out of range"))
        };
        let mut code = Vec::with_capacity(offset);
        for inst in &info.code {
            let mut op = inst.op.clone();
            for target in op.targets_mut() {
                *target = to_offset(*target)?;
            }
            self.encode_inst(&Inst { line: inst.line, op }, &mut code)?;
        }
        Ok(json!([
            "!",
            BYTECODE_VERSION,
            &*info.source,
            info.line,
            info.param_count,
            info.upvalue_count,
            info.extra_args,
            info.named_args,
            info.params.iter().map(|name| name.to_string()).collect::<Vec<_>>(),
            to_offset(info.entry)?,
            to_offset(info.handler)?,
            info.decls.iter().map(|name| name.to_string()).collect::<Vec<_>>(),
            code,
        ]))
    }

    fn encode_inst(&mut self, inst: &Inst, out: &mut Vec<Json>) -> Result<()> {
        out.push(json!(inst.op.opcode() as u8));
        out.push(json!(inst.line));
        match &inst.op {
            Op::And(n)
            | Op::Or(n)
            | Op::Exit(n)
            | Op::Goto(n)
            | Op::Try(n)
            | Op::Local(n)
            | Op::LocalPush(n)
            | Op::Upvalue(n)
            | Op::Var(n)
            | Op::Let(n)
            | Op::LetI(n)
            | Op::AssignLocal(n)
            | Op::Call(n)
            | Op::TailCall(n)
            | Op::Iter(n)
            | Op::Next(n)
            | Op::TupleNew(n)
            | Op::PartialNew(n)
            | Op::PartialSet(n)
            | Op::StringAdd(n) => out.push(json!(n)),
            Op::Load(value) | Op::LoadPush(value) | Op::Resolve(value) => out.push(self.encode(value)?),
            Op::Enter { vars, lets } => out.extend([json!(vars), json!(lets)]),
            Op::Catch { handler, depth } | Op::CatchX { handler, depth } => {
                out.extend([json!(handler), json!(depth)])
            }
            Op::CatchType { next, kinds } => {
                let kinds: Vec<&str> = kinds.iter().map(|k| &**k).collect();
                out.extend([json!(next), json!(kinds)]);
            }
            Op::LocalI { slot, name } => out.extend([json!(slot), json!(&**name)]),
            Op::VarX { slot, count } | Op::LetX { slot, count } => out.extend([json!(slot), json!(count)]),
            Op::CallConst { func, count } | Op::TailCallConst { func, count } => {
                out.push(self.encode(func)?);
                out.push(json!(count));
            }
            Op::Closure { info, captures } => {
                out.push(self.encode_info(info)?);
                out.extend(captures.iter().map(|index| json!(index)));
            }
            Op::Switch(targets) => out.push(json!(targets)),
            Op::StringAdds(text) => out.push(json!(&**text)),
            Op::Return
            | Op::Suspend
            | Op::Resume
            | Op::Nil
            | Op::NilPush
            | Op::Some
            | Op::Not
            | Op::Push
            | Op::Pop
            | Op::Retry
            | Op::Assign
            | Op::For
            | Op::Key
            | Op::Value1
            | Op::Value2
            | Op::ListNew
            | Op::ListAppend
            | Op::MapNew
            | Op::MapInsert
            | Op::StringNew
            | Op::StringEnd => {}
        }
        Ok(())
    }
}
