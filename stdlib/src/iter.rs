//! Generic consumers of the iteration protocol: `count`, `first`,
//! `first2` and `collect`.
//!
//! Each step is a separate scheduler task, so consuming a long or
//! generator-backed sequence never grows the host stack.

use kestrel_core::val::Dereferenceable;
use kestrel_core::{Caller, Runtime, Value, continuation};

fn first_arg(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or(Value::Nil)
}

/// Errors and exhaustion end a traversal; returns true when `state` did.
fn finished(rt: &Runtime, caller: &Caller, state: &Value, done: impl FnOnce() -> Value) -> bool {
    if state.is_error() {
        rt.resume(caller.clone(), state.clone());
        true
    } else if state.is_nil() {
        rt.resume(caller.clone(), done());
        true
    } else {
        false
    }
}

fn count_from(rt: &Runtime, caller: Caller, state: Value, seen: i64) {
    if finished(rt, &caller, &state, || Value::Integer(seen)) {
        return;
    }
    rt.iter_next(continuation(move |rt, next| count_from(rt, caller, next, seen + 1)), state);
}

fn collect_from(rt: &Runtime, caller: Caller, state: Value, mut items: Vec<Value>) {
    if state.is_error() {
        rt.resume(caller, state);
        return;
    }
    if state.is_nil() {
        rt.resume(caller, Value::list(items));
        return;
    }
    let current = state.clone();
    rt.iter_value(
        continuation(move |rt, value| {
            items.push(value.deref_value());
            rt.iter_next(continuation(move |rt, next| collect_from(rt, caller, next, items)), current);
        }),
        state,
    );
}

pub fn count(rt: &Runtime, caller: Caller, args: Vec<Value>) {
    rt.iterate(continuation(move |rt, state| count_from(rt, caller, state, 0)), first_arg(args));
}

pub fn first(rt: &Runtime, caller: Caller, args: Vec<Value>) {
    rt.iterate(
        continuation(move |rt, state| {
            if finished(rt, &caller, &state, || Value::Nil) {
                return;
            }
            rt.iter_value(continuation(move |rt, value| rt.resume(caller, value.deref_value())), state);
        }),
        first_arg(args),
    );
}

/// First key and value as a tuple.
pub fn first2(rt: &Runtime, caller: Caller, args: Vec<Value>) {
    rt.iterate(
        continuation(move |rt, state| {
            if finished(rt, &caller, &state, || Value::Nil) {
                return;
            }
            let current = state.clone();
            rt.iter_key(
                continuation(move |rt, key| {
                    rt.iter_value(
                        continuation(move |rt, value| {
                            rt.resume(caller, Value::tuple(vec![key, value.deref_value()]));
                        }),
                        current,
                    );
                }),
                state,
            );
        }),
        first_arg(args),
    );
}

pub fn collect(rt: &Runtime, caller: Caller, args: Vec<Value>) {
    rt.iterate(
        continuation(move |rt, state| collect_from(rt, caller, state, Vec::new())),
        first_arg(args),
    );
}

pub fn register(rt: &Runtime) {
    let any = [rt.builtins().any.clone()];
    rt.define_method("count", &any, false, Value::native("count", count));
    rt.define_method("first", &any, false, Value::native("first", first));
    rt.define_method("first2", &any, false, Value::native("first2", first2));
    rt.define_method("collect", &any, false, Value::native("collect", collect));
}
