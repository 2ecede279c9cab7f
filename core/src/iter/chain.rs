//! Chained functions: a base plus a pipeline of mapping and filtering steps.
//!
//! Iterating a chain iterates its base and pushes every key/value pair
//! through the steps. Calling a chain composes its functions.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dispatch::Callable;
use crate::rt::{Caller, Continuation, Runtime, continuation};
use crate::val::error::kind;
use crate::val::{Dereferenceable, Value};

pub const MAP_MARKER: &str = "->";
pub const DUO_MARKER: &str = "=>";
pub const FILTER_MARKER: &str = "->?";
pub const FILTER_DUO_MARKER: &str = "=>?";

#[derive(Clone)]
pub enum ChainStep {
    /// `-> f`: value becomes `f(value)`.
    Map(Value),
    /// `=> k, v`: key becomes `k(key, value)`, value becomes `v(key, value)`
    /// using the old pair for both.
    Duo { key: Value, value: Value },
    /// `->? f`: drop the pair when `f(value)` is nil.
    Filter(Value),
    /// `=>? f`: drop the pair when `f(key, value)` is nil.
    FilterDuo(Value),
}

pub struct Chained {
    base: Value,
    steps: Vec<ChainStep>,
}

impl Chained {
    pub fn new(base: Value, steps: Vec<ChainStep>) -> Rc<Self> {
        Rc::new(Self { base, steps })
    }

    /// Build from a flat entry list in which marker methods introduce the
    /// functions that follow them. A single entry is returned unchanged.
    pub fn from_entries(entries: Vec<Value>) -> Value {
        let mut entries = entries.into_iter();
        let Some(base) = entries.next() else {
            return Value::Nil;
        };
        let mut steps = Vec::new();
        while let Some(entry) = entries.next() {
            let marker = match &entry {
                Value::Method(method) => method.name().to_string(),
                _ => String::new(),
            };
            let mut operand = || {
                entries
                    .next()
                    .ok_or_else(|| Value::error(kind::STATE_ERROR, "Missing value function for chain"))
            };
            let step = match marker.as_str() {
                MAP_MARKER => operand().map(ChainStep::Map),
                DUO_MARKER => operand().and_then(|key| operand().map(|value| ChainStep::Duo { key, value })),
                FILTER_MARKER => operand().map(ChainStep::Filter),
                FILTER_DUO_MARKER => operand().map(ChainStep::FilterDuo),
                _ => Ok(ChainStep::Map(entry)),
            };
            match step {
                Ok(step) => steps.push(step),
                Err(error) => return error,
            }
        }
        if steps.is_empty() {
            return base;
        }
        Value::Chained(Self::new(base, steps))
    }

    #[inline]
    pub fn base(&self) -> &Value {
        &self.base
    }

    #[inline]
    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    /// A new chain with one more step.
    pub fn then(&self, step: ChainStep) -> Rc<Self> {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self::new(self.base.clone(), steps)
    }
}

impl Callable for Rc<Chained> {
    fn call(&self, rt: &Runtime, caller: Caller, args: Vec<Value>) {
        let chain = self.clone();
        let next = continuation(move |rt, value| compose(rt, caller, chain, 0, value));
        rt.call(next, self.base.clone(), args);
    }
}

fn compose(rt: &Runtime, caller: Caller, chain: Rc<Chained>, index: usize, value: Value) {
    let value = value.deref_value();
    if value.is_error() {
        rt.resume(caller, value);
        return;
    }
    let Some(step) = chain.steps.get(index).cloned() else {
        rt.resume(caller, value);
        return;
    };
    match step {
        ChainStep::Map(func) | ChainStep::Duo { value: func, .. } => {
            let next = continuation(move |rt, value| compose(rt, caller, chain, index + 1, value));
            rt.call(next, func, vec![value]);
        }
        ChainStep::Filter(func) | ChainStep::FilterDuo(func) => {
            let kept = value.clone();
            let next = continuation(move |rt, verdict: Value| {
                let verdict = verdict.deref_value();
                if verdict.is_error() || verdict.is_nil() {
                    rt.resume(caller, verdict);
                } else {
                    compose(rt, caller, chain, index + 1, kept);
                }
            });
            rt.call(next, func, vec![value]);
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Stage {
    Next,
    Key,
    Value,
    DuoKey,
    Filter,
}

struct Progress {
    caller: Option<Caller>,
    stage: Stage,
    index: usize,
    iter: Value,
    key: Value,
    value: Value,
    pending: Option<Value>,
}

/// Iteration state of a chain; also the continuation that drives it.
pub struct ChainState {
    chain: Rc<Chained>,
    progress: RefCell<Progress>,
}

pub(crate) fn start(rt: &Runtime, caller: Caller, chain: Rc<Chained>) {
    let base = chain.base.clone();
    let state = Rc::new(ChainState {
        chain,
        progress: RefCell::new(Progress {
            caller: Some(caller),
            stage: Stage::Next,
            index: 0,
            iter: Value::Nil,
            key: Value::Nil,
            value: Value::Nil,
            pending: None,
        }),
    });
    rt.iterate(state, base);
}

impl ChainState {
    pub fn key(&self) -> Value {
        self.progress.borrow().key.clone()
    }

    pub fn value(&self) -> Value {
        self.progress.borrow().value.clone()
    }

    pub(crate) fn advance(self: Rc<Self>, rt: &Runtime, caller: Caller) {
        let iter = {
            let mut progress = self.progress.borrow_mut();
            progress.caller = Some(caller);
            progress.stage = Stage::Next;
            progress.iter.clone()
        };
        rt.iter_next(self, iter);
    }

    fn finish(&self, rt: &Runtime, value: Value) {
        let caller = self.progress.borrow().caller.clone();
        match caller {
            Some(caller) => rt.resume(caller, value),
            None => tracing::warn!(target: "kestrel::sched", "chain state finished without a caller"),
        }
    }

    fn continue_steps(self: Rc<Self>, rt: &Runtime, value: Value) {
        let mut progress = self.progress.borrow_mut();
        progress.value = value.clone();
        let step = self.chain.steps.get(progress.index).cloned();
        progress.index += 1;
        let (func, args) = match step {
            None => {
                drop(progress);
                let state = Value::ChainState(self.clone());
                self.finish(rt, state);
                return;
            }
            Some(ChainStep::Map(func)) => {
                progress.stage = Stage::Value;
                (func, vec![value])
            }
            Some(ChainStep::Duo { key, value: func }) => {
                progress.stage = Stage::DuoKey;
                progress.pending = Some(func);
                (key, vec![progress.key.clone(), value])
            }
            Some(ChainStep::Filter(func)) => {
                progress.stage = Stage::Filter;
                (func, vec![value])
            }
            Some(ChainStep::FilterDuo(func)) => {
                progress.stage = Stage::Filter;
                (func, vec![progress.key.clone(), value])
            }
        };
        drop(progress);
        rt.call(self, func, args);
    }
}

impl Continuation for ChainState {
    fn resume(self: Rc<Self>, rt: &Runtime, value: Value) {
        let stage = self.progress.borrow().stage;
        let value = match stage {
            Stage::Next => value,
            _ => value.deref_value(),
        };
        if value.is_error() {
            self.finish(rt, value);
            return;
        }
        match stage {
            Stage::Next => {
                if value.is_nil() {
                    self.finish(rt, Value::Nil);
                    return;
                }
                {
                    let mut progress = self.progress.borrow_mut();
                    progress.stage = Stage::Key;
                    progress.index = 0;
                    progress.iter = value.clone();
                }
                rt.iter_key(self, value);
            }
            Stage::Key => {
                let iter = {
                    let mut progress = self.progress.borrow_mut();
                    progress.key = value;
                    progress.stage = Stage::Value;
                    progress.iter.clone()
                };
                rt.iter_value(self, iter);
            }
            Stage::Value => self.continue_steps(rt, value),
            Stage::DuoKey => {
                let (func, args) = {
                    let mut progress = self.progress.borrow_mut();
                    let args = vec![progress.key.clone(), progress.value.clone()];
                    progress.key = value;
                    progress.stage = Stage::Value;
                    (progress.pending.take().unwrap_or(Value::Nil), args)
                };
                rt.call(self, func, args);
            }
            Stage::Filter => {
                if value.is_nil() {
                    let iter = {
                        let mut progress = self.progress.borrow_mut();
                        progress.stage = Stage::Next;
                        progress.iter.clone()
                    };
                    rt.iter_next(self, iter);
                } else {
                    let kept = self.progress.borrow().value.clone();
                    self.continue_steps(rt, kept);
                }
            }
        }
    }
}
