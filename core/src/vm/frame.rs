//! Bytecode interpreter.
//!
//! A frame runs until it needs something from outside (a call, an
//! iterator step, a suspend or a return) and then hands that request to
//! the scheduler. When the request completes the frame is resumed with
//! the result and picks up at its saved `ip`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::dispatch::Callable;
use crate::rt::{Caller, Continuation, Debugger, Runtime};
use crate::val::error::kind;
use crate::val::{
    Assignable, Dereferenceable, MapValue, Partial, Uninitialized, Upvalues, Value,
};
use crate::vm::closure::{Closure, ClosureInfo};
use crate::vm::opcode::Op;

struct FrameState {
    caller: Option<Caller>,
    ip: usize,
    ep: usize,
    line: u32,
    stack: Vec<Value>,
    suspended: bool,
    debug_line: u32,
    debug_skip: bool,
}

/// One activation of a closure.
pub struct Frame {
    info: Rc<ClosureInfo>,
    upvalues: Upvalues,
    state: RefCell<FrameState>,
}

/// What the frame asks of the scheduler once its borrow is released.
enum Handoff {
    Resume(Caller, Value),
    Call(Caller, Value, Vec<Value>),
    Iterate(Value),
    Next(Value),
    Key(Value),
    Value(Value),
    Debug(Rc<dyn Debugger>, Value),
    Halt,
}

/// Where an in-frame error goes: traced, then to the handler.
fn raise(info: &ClosureInfo, state: &FrameState, line: u32, error: &Value) -> usize {
    if let Value::Error(err) = error {
        err.push_trace(&info.source, line);
    }
    state.ep
}

fn expected_error(result: &Value) -> Value {
    Value::internal_error(format!("expected error, not {}", result.kind_name()))
}

fn split_args(stack: &mut Vec<Value>, count: usize) -> Vec<Value> {
    let at = stack.len().saturating_sub(count);
    stack.split_off(at)
}

fn slot(stack: &[Value], index: usize) -> Value {
    match stack.get(index) {
        Some(Value::Unset) | None => Value::Nil,
        Some(value) => value.clone(),
    }
}

impl Frame {
    pub(crate) fn new(info: Rc<ClosureInfo>, upvalues: Upvalues, caller: Caller, stack: Vec<Value>) -> Rc<Self> {
        let state = FrameState {
            caller: Some(caller),
            ip: info.entry,
            ep: info.handler,
            line: info.line,
            stack,
            suspended: false,
            debug_line: 0,
            debug_skip: false,
        };
        Rc::new(Self {
            info,
            upvalues,
            state: RefCell::new(state),
        })
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.info.source
    }

    #[inline]
    pub fn info(&self) -> &Rc<ClosureInfo> {
        &self.info
    }

    pub fn line(&self) -> u32 {
        self.state.borrow().line
    }

    pub fn is_suspended(&self) -> bool {
        self.state.borrow().suspended
    }

    /// Copy of the operand stack, for debuggers and tests.
    pub fn stack_snapshot(&self) -> Vec<Value> {
        self.state.borrow().stack.clone()
    }

    /// Continue a frame parked by the debugger, skipping the check once.
    pub fn debug_continue(self: &Rc<Self>, rt: &Runtime, result: Value) {
        self.state.borrow_mut().debug_skip = true;
        let frame = self.clone();
        rt.schedule(move |rt| frame.run(rt, result, false));
    }

    /// Value `depth` slots from the top of a suspended frame's stack.
    pub(crate) fn yielded(&self, depth: usize) -> Value {
        let state = self.state.borrow();
        if !state.suspended {
            return Value::error(kind::STATE_ERROR, "Function did not suspend");
        }
        let len = state.stack.len();
        if len < depth {
            return Value::Nil;
        }
        state.stack[len - depth].clone()
    }

    pub(crate) fn iter_next(self: &Rc<Self>, rt: &Runtime, caller: Caller) {
        let mut state = self.state.borrow_mut();
        if !state.suspended {
            drop(state);
            rt.resume(caller, Value::Nil);
            return;
        }
        state.caller = Some(caller);
        drop(state);
        rt.resume(self.clone(), Value::Nil);
    }

    fn run(self: Rc<Self>, rt: &Runtime, result: Value, entering: bool) {
        match self.step(rt, result, entering) {
            Handoff::Resume(caller, value) => rt.resume(caller, value),
            Handoff::Call(caller, func, args) => rt.call(caller, func, args),
            Handoff::Iterate(value) => rt.iterate(self, value),
            Handoff::Next(value) => rt.iter_next(self, value),
            Handoff::Key(value) => rt.iter_key(self, value),
            Handoff::Value(value) => rt.iter_value(self, value),
            Handoff::Debug(debugger, result) => {
                tracing::debug!(
                    target: "kestrel::debug",
                    source = %self.info.source,
                    line = self.line(),
                    "frame paused"
                );
                debugger.run(rt, self, result);
            }
            Handoff::Halt => {}
        }
    }

    fn step(self: &Rc<Self>, rt: &Runtime, mut result: Value, entering: bool) -> Handoff {
        let info = &self.info;
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let mut ip = state.ip;
        if entering && let Value::Error(err) = &result {
            err.push_trace(&info.source, state.line);
            ip = state.ep;
        }
        loop {
            let Some(inst) = info.code.get(ip) else {
                let error = Value::internal_error(format!("instruction pointer {ip} out of range"));
                return match state.caller.clone() {
                    Some(caller) => Handoff::Resume(caller, error),
                    None => Handoff::Halt,
                };
            };
            let line = inst.line;
            if let Some(debugger) = rt.debugger() {
                if state.debug_skip {
                    state.debug_skip = false;
                } else {
                    let changed = line != state.debug_line;
                    state.debug_line = line;
                    if debugger.step_in() || (changed && debugger.breakpoint(&info.source, line)) {
                        state.ip = ip;
                        state.line = line;
                        return Handoff::Debug(debugger.clone(), result);
                    }
                }
            }
            match &inst.op {
                Op::Return => {
                    if let Value::Error(err) = &result {
                        tracing::debug!(
                            target: "kestrel::frame",
                            source = %info.source,
                            line,
                            kind = err.kind(),
                            "error leaves frame"
                        );
                    }
                    return match state.caller.clone() {
                        Some(caller) => Handoff::Resume(caller, result),
                        None => {
                            tracing::warn!(target: "kestrel::frame", source = %info.source, "return without caller");
                            Handoff::Halt
                        }
                    };
                }
                Op::Suspend => {
                    state.suspended = true;
                    state.ip = ip + 1;
                    state.line = line;
                    return match state.caller.clone() {
                        Some(caller) => Handoff::Resume(caller, Value::Frame(self.clone())),
                        None => Handoff::Halt,
                    };
                }
                Op::Resume => {
                    state.suspended = false;
                    state.stack.pop();
                    state.stack.pop();
                    ip += 1;
                }
                Op::Nil => {
                    result = Value::Nil;
                    ip += 1;
                }
                Op::NilPush => {
                    result = Value::Nil;
                    state.stack.push(Value::Nil);
                    ip += 1;
                }
                Op::Some => {
                    result = Value::Some;
                    ip += 1;
                }
                Op::And(target) => {
                    ip = if result.deref_value().is_nil() { *target } else { ip + 1 };
                }
                Op::Or(target) => {
                    ip = if result.deref_value().is_nil() { ip + 1 } else { *target };
                }
                Op::Not => {
                    result = Value::truth(result.deref_value().is_nil());
                    ip += 1;
                }
                Op::Push => {
                    state.stack.push(result.clone());
                    ip += 1;
                }
                Op::Pop => {
                    result = state.stack.pop().unwrap_or(Value::Nil);
                    ip += 1;
                }
                Op::Load(value) => {
                    result = value.clone();
                    ip += 1;
                }
                Op::LoadPush(value) => {
                    result = value.clone();
                    state.stack.push(result.clone());
                    ip += 1;
                }
                Op::Enter { vars, lets } => {
                    for _ in 0..*vars {
                        state.stack.push(Value::variable(Value::Nil));
                    }
                    state.stack.resize(state.stack.len() + lets, Value::Unset);
                    ip += 1;
                }
                Op::Exit(count) => {
                    let len = state.stack.len().saturating_sub(*count);
                    state.stack.truncate(len);
                    ip += 1;
                }
                Op::Goto(target) => ip = *target,
                Op::Try(handler) => {
                    state.ep = *handler;
                    ip += 1;
                }
                Op::Catch { handler, depth } | Op::CatchX { handler, depth } => {
                    state.ep = *handler;
                    match &result {
                        Value::Error(err) => {
                            let caught = Value::ErrorValue(err.clone());
                            state.stack.truncate(*depth);
                            if matches!(inst.op, Op::Catch { .. }) {
                                state.stack.push(caught.clone());
                                result = caught;
                            } else {
                                result = Value::Nil;
                            }
                            ip += 1;
                        }
                        other => {
                            result = expected_error(other);
                            ip = raise(info, state, line, &result);
                        }
                    }
                }
                Op::CatchType { next, kinds } => match &result {
                    Value::Error(err) => {
                        ip = if kinds.iter().any(|k| &**k == err.kind()) { ip + 1 } else { *next };
                    }
                    other => {
                        result = expected_error(other);
                        ip = raise(info, state, line, &result);
                    }
                },
                Op::Retry => ip = state.ep,
                Op::Local(index) => {
                    result = slot(&state.stack, *index);
                    ip += 1;
                }
                Op::LocalPush(index) => {
                    result = slot(&state.stack, *index);
                    state.stack.push(result.clone());
                    ip += 1;
                }
                Op::LocalI { slot: index, name } => {
                    match state.stack.get_mut(*index) {
                        Some(entry @ Value::Unset) => {
                            *entry = Value::Uninitialized(Uninitialized::new(name));
                            result = entry.clone();
                        }
                        Some(entry) => result = entry.clone(),
                        None => result = Value::Nil,
                    }
                    ip += 1;
                }
                Op::Upvalue(index) => {
                    result = match self.upvalues.borrow().get(*index) {
                        Some(Value::Unset) | None => Value::Nil,
                        Some(value) => value.clone(),
                    };
                    ip += 1;
                }
                Op::Var(index) => {
                    result = result.deref_value();
                    if let Some(cell) = state.stack.get(*index) {
                        cell.assign(result.clone());
                    }
                    ip += 1;
                }
                Op::VarX { slot: index, count } => {
                    let packed = result.deref_value();
                    for offset in 0..*count {
                        result = packed.unpack(offset + 1).deref_value();
                        if let Some(cell) = state.stack.get(index + offset) {
                            cell.assign(result.clone());
                        }
                    }
                    ip += 1;
                }
                Op::Let(index) => {
                    result = result.deref_value();
                    if let Some(entry) = state.stack.get_mut(*index) {
                        *entry = result.clone();
                    }
                    ip += 1;
                }
                Op::LetI(index) => {
                    result = result.deref_value();
                    if let Some(entry) = state.stack.get_mut(*index) {
                        let previous = std::mem::replace(entry, result.clone());
                        if let Value::Uninitialized(placeholder) = previous {
                            placeholder.resolve(&result);
                        }
                    }
                    ip += 1;
                }
                Op::LetX { slot: index, count } => {
                    let packed = result.deref_value();
                    for offset in 0..*count {
                        result = packed.unpack(offset + 1).deref_value();
                        if let Some(entry) = state.stack.get_mut(index + offset) {
                            let previous = std::mem::replace(entry, result.clone());
                            if let Value::Uninitialized(placeholder) = previous {
                                placeholder.resolve(&result);
                            }
                        }
                    }
                    ip += 1;
                }
                Op::Assign | Op::AssignLocal(_) => {
                    let value = result.deref_value();
                    let target = match &inst.op {
                        Op::AssignLocal(index) => state.stack.get(*index).cloned().unwrap_or(Value::Nil),
                        _ => state.stack.pop().unwrap_or(Value::Nil),
                    };
                    result = target.assign(value);
                    ip = if result.is_error() { raise(info, state, line, &result) } else { ip + 1 };
                }
                Op::Call(count) => {
                    let args = split_args(&mut state.stack, *count);
                    let func = state.stack.pop().unwrap_or(Value::Nil).deref_value();
                    state.ip = ip + 1;
                    state.line = line;
                    return Handoff::Call(self.clone(), func, args);
                }
                Op::CallConst { func, count } => {
                    let args = split_args(&mut state.stack, *count);
                    state.ip = ip + 1;
                    state.line = line;
                    return Handoff::Call(self.clone(), func.clone(), args);
                }
                Op::TailCall(count) => {
                    let args = split_args(&mut state.stack, *count);
                    let func = state.stack.pop().unwrap_or(Value::Nil).deref_value();
                    return match state.caller.take() {
                        Some(caller) => Handoff::Call(caller, func, args),
                        None => Handoff::Halt,
                    };
                }
                Op::TailCallConst { func, count } => {
                    let args = split_args(&mut state.stack, *count);
                    return match state.caller.take() {
                        Some(caller) => Handoff::Call(caller, func.clone(), args),
                        None => Handoff::Halt,
                    };
                }
                Op::For => {
                    state.ip = ip + 1;
                    state.line = line;
                    return Handoff::Iterate(result.deref_value());
                }
                Op::Iter(exit) => {
                    if result.is_nil() {
                        ip = *exit;
                    } else {
                        state.stack.push(result.clone());
                        ip += 1;
                    }
                }
                Op::Next(head) => {
                    let iter = state.stack.pop().unwrap_or(Value::Nil);
                    state.ip = *head;
                    state.line = line;
                    return Handoff::Next(iter);
                }
                Op::Key | Op::Value1 | Op::Value2 => {
                    let depth = if matches!(inst.op, Op::Value2) { 2 } else { 1 };
                    let len = state.stack.len();
                    let iter = if len >= depth { state.stack[len - depth].clone() } else { Value::Nil };
                    state.ip = ip + 1;
                    state.line = line;
                    return match inst.op {
                        Op::Key => Handoff::Key(iter),
                        _ => Handoff::Value(iter),
                    };
                }
                Op::ListNew => {
                    state.stack.push(Value::list(Vec::new()));
                    ip += 1;
                }
                Op::ListAppend => {
                    match state.stack.last() {
                        Some(Value::List(items)) => {
                            let value = result.deref_value();
                            items.borrow_mut().push(value);
                            ip += 1;
                        }
                        _ => {
                            result = Value::internal_error("LIST_APPEND without a list on the stack");
                            ip = raise(info, state, line, &result);
                        }
                    }
                }
                Op::MapNew => {
                    state.stack.push(Value::Map(MapValue::new()));
                    ip += 1;
                }
                Op::MapInsert => {
                    let key = state.stack.pop().unwrap_or(Value::Nil).deref_value();
                    match state.stack.last() {
                        Some(Value::Map(map)) => {
                            map.insert(key, result.deref_value());
                            ip += 1;
                        }
                        _ => {
                            result = Value::internal_error("MAP_INSERT without a map on the stack");
                            ip = raise(info, state, line, &result);
                        }
                    }
                }
                Op::TupleNew(count) => {
                    result = Value::tuple(split_args(&mut state.stack, *count));
                    ip += 1;
                }
                Op::PartialNew(capacity) => {
                    result = result.deref_value();
                    state.stack.push(Value::Partial(Partial::new(result.clone(), *capacity)));
                    ip += 1;
                }
                Op::PartialSet(index) => {
                    result = result.deref_value();
                    match state.stack.last() {
                        Some(Value::Partial(partial)) => {
                            partial.set(*index, result.clone());
                            ip += 1;
                        }
                        _ => {
                            result = Value::internal_error("PARTIAL_SET without a partial function");
                            ip = raise(info, state, line, &result);
                        }
                    }
                }
                Op::Closure { info: nested, captures } => {
                    let upvalues: Upvalues = Rc::new(RefCell::new(Vec::with_capacity(captures.len())));
                    for (position, &index) in captures.iter().enumerate() {
                        let value = if index < 0 {
                            let outer = (!index) as usize;
                            let mut outer_values = self.upvalues.borrow_mut();
                            match outer_values.get_mut(outer) {
                                Some(entry @ Value::Unset) => {
                                    *entry = Value::Uninitialized(Uninitialized::new("<upvalue>"));
                                    entry.clone()
                                }
                                Some(entry) => entry.clone(),
                                None => Value::Nil,
                            }
                        } else {
                            match state.stack.get_mut(index as usize) {
                                Some(entry @ Value::Unset) => {
                                    *entry = Value::Uninitialized(Uninitialized::new("<upvalue>"));
                                    entry.clone()
                                }
                                Some(entry) => entry.clone(),
                                None => Value::Nil,
                            }
                        };
                        if let Value::Uninitialized(placeholder) = &value {
                            placeholder.record_use(&upvalues, position);
                        }
                        upvalues.borrow_mut().push(value);
                    }
                    result = Value::Closure(Closure::with_upvalues(nested.clone(), upvalues));
                    ip += 1;
                }
                Op::Switch(targets) => match result.deref_value() {
                    Value::Integer(n) => {
                        let last = targets.len().saturating_sub(1);
                        let index = if n < 0 { last } else { (n as usize).min(last) };
                        match targets.get(index) {
                            Some(target) => ip = *target,
                            None => {
                                result = Value::internal_error("SWITCH with no targets");
                                ip = raise(info, state, line, &result);
                            }
                        }
                    }
                    other => {
                        result = Value::type_error(format!("expected integer, not {}", other.kind_name()));
                        ip = raise(info, state, line, &result);
                    }
                },
                Op::Resolve(name) => {
                    state.ip = ip + 1;
                    state.line = line;
                    let method = Value::Method(rt.method("::"));
                    return Handoff::Call(self.clone(), method, vec![result, name.clone()]);
                }
                Op::StringNew => {
                    state.stack.push(Value::StringBuffer(Rc::new(RefCell::new(String::new()))));
                    ip += 1;
                }
                Op::StringAdd(count) => {
                    let args = split_args(&mut state.stack, count + 1);
                    if let Some(buffer) = args.first() {
                        state.stack.push(buffer.clone());
                    }
                    state.ip = ip + 1;
                    state.line = line;
                    let method = Value::Method(rt.method("append"));
                    return Handoff::Call(self.clone(), method, args);
                }
                Op::StringAdds(text) => {
                    if let Some(Value::StringBuffer(buffer)) = state.stack.last() {
                        buffer.borrow_mut().push_str(text);
                    }
                    ip += 1;
                }
                Op::StringEnd => {
                    let text = match state.stack.pop() {
                        Some(Value::StringBuffer(buffer)) => buffer.borrow().clone(),
                        _ => String::new(),
                    };
                    result = Value::from(text);
                    state.stack.push(result.clone());
                    ip += 1;
                }
            }
        }
    }
}

impl Continuation for Frame {
    fn resume(self: Rc<Self>, rt: &Runtime, value: Value) {
        self.run(rt, value, true);
    }
}

impl Callable for Rc<Frame> {
    /// Resume a suspended frame with `args[0]` as the suspend expression's value.
    fn call(&self, rt: &Runtime, caller: Caller, args: Vec<Value>) {
        {
            let mut state = self.state.borrow_mut();
            if !state.suspended {
                drop(state);
                rt.resume(caller, Value::error(kind::STATE_ERROR, "Function did not suspend"));
                return;
            }
            state.caller = Some(caller);
        }
        let value = args.into_iter().next().map(|arg| arg.deref_value()).unwrap_or(Value::Nil);
        rt.resume(self.clone(), value);
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Frame")
            .field("source", &self.info.source)
            .field("ip", &state.ip)
            .field("line", &state.line)
            .field("depth", &state.stack.len())
            .field("suspended", &state.suspended)
            .finish()
    }
}
