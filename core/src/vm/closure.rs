use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::dispatch::Callable;
use crate::rt::{Caller, Runtime};
use crate::val::error::kind;
use crate::val::{Dereferenceable, MapValue, Upvalues, Value};
use crate::vm::Frame;
use crate::vm::opcode::Inst;

/// Immutable program block shared by every closure created from it.
pub struct ClosureInfo {
    pub source: Rc<str>,
    pub line: u32,
    /// Slot count for arguments, including the extra and named collectors.
    pub param_count: usize,
    pub upvalue_count: usize,
    pub extra_args: bool,
    pub named_args: bool,
    pub params: Vec<Rc<str>>,
    pub entry: usize,
    pub handler: usize,
    pub decls: Vec<Rc<str>>,
    pub code: Vec<Inst>,
}

impl ClosureInfo {
    /// Slots filled by positional arguments.
    pub fn positional_count(&self) -> usize {
        self.param_count - usize::from(self.extra_args) - usize::from(self.named_args)
    }

    /// Lay out the initial frame stack for a call.
    ///
    /// Positional arguments fill parameters left to right. A `Names` marker
    /// starts name/value pairs that bind by parameter name, or land in the
    /// options map when the closure collects named arguments.
    pub fn bind_arguments(&self, args: &[Value]) -> Result<Vec<Value>, Value> {
        let positional = self.positional_count();
        let mut stack = Vec::with_capacity(self.param_count);
        let mut i = 0;
        while i < args.len().min(positional) {
            if matches!(args[i], Value::Names(_)) {
                break;
            }
            stack.push(args[i].deref_value());
            i += 1;
        }
        stack.resize(positional, Value::Nil);
        if self.extra_args {
            let mut rest = Vec::new();
            while i < args.len() && !matches!(args[i], Value::Names(_)) {
                rest.push(args[i].deref_value());
                i += 1;
            }
            stack.push(Value::list(rest));
        }
        let options = self.named_args.then(MapValue::new);
        while i < args.len() {
            if let Value::Names(names) = &args[i] {
                for name in names.iter() {
                    i += 1;
                    let value = args.get(i).map(Dereferenceable::deref_value).unwrap_or(Value::Nil);
                    match self.params.iter().position(|param| param == name) {
                        Some(index) if index < stack.len() => stack[index] = value,
                        _ => match &options {
                            Some(options) => {
                                options.insert(Value::String(name.clone()), value);
                            }
                            None => {
                                return Err(Value::error(
                                    kind::NAME_ERROR,
                                    format!("Unknown named parameter {name}"),
                                ));
                            }
                        },
                    }
                }
                break;
            }
            i += 1;
        }
        if let Some(options) = options {
            stack.push(Value::Map(options));
        }
        Ok(stack)
    }
}

impl fmt::Debug for ClosureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureInfo")
            .field("source", &self.source)
            .field("line", &self.line)
            .field("params", &self.params)
            .field("instructions", &self.code.len())
            .finish()
    }
}

pub struct Closure {
    info: Rc<ClosureInfo>,
    upvalues: Upvalues,
}

impl Closure {
    pub fn new(info: Rc<ClosureInfo>, upvalues: Vec<Value>) -> Rc<Self> {
        Self::with_upvalues(info, Rc::new(RefCell::new(upvalues)))
    }

    pub fn with_upvalues(info: Rc<ClosureInfo>, upvalues: Upvalues) -> Rc<Self> {
        Rc::new(Self { info, upvalues })
    }

    #[inline]
    pub fn info(&self) -> &Rc<ClosureInfo> {
        &self.info
    }

    #[inline]
    pub fn upvalues(&self) -> &Upvalues {
        &self.upvalues
    }
}

impl Callable for Rc<Closure> {
    fn call(&self, rt: &Runtime, caller: Caller, args: Vec<Value>) {
        match self.info.bind_arguments(&args) {
            Ok(stack) => {
                let frame = Frame::new(self.info.clone(), self.upvalues.clone(), caller, stack);
                rt.resume(frame, Value::Nil);
            }
            Err(error) => rt.resume(caller, error),
        }
    }
}
