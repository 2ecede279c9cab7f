//! Arithmetic and comparison.
//!
//! Integer pairs get exact overloads; anything else numeric falls back to
//! the `(number, number)` definitions and computes in `f64`.

use std::cmp::Ordering;
use std::rc::Rc;

use kestrel_core::val::error::kind;
use kestrel_core::val::Type;
use kestrel_core::{Runtime, Value};

fn overflow(op: &str) -> Value {
    Value::error(kind::RANGE_ERROR, format!("integer overflow in {op}"))
}

fn division_by_zero() -> Value {
    Value::error(kind::RANGE_ERROR, "division by zero")
}

fn define_int(rt: &Runtime, name: &'static str, op: fn(i64, i64) -> Value) {
    let b = rt.builtins();
    let types = [b.integer.clone(), b.integer.clone()];
    rt.define_method(
        name,
        &types,
        false,
        Value::native_sync(name, move |_, args| match (&args[0], &args[1]) {
            (Value::Integer(a), Value::Integer(b)) => op(*a, *b),
            _ => Value::type_error(format!("{name} expects integers")),
        }),
    );
}

fn define_real(rt: &Runtime, name: &'static str, op: fn(f64, f64) -> Value) {
    let b = rt.builtins();
    let types = [b.number.clone(), b.number.clone()];
    rt.define_method(
        name,
        &types,
        false,
        Value::native_sync(name, move |_, args| match (args[0].as_real(), args[1].as_real()) {
            (Some(a), Some(b)) => op(a, b),
            _ => Value::type_error(format!("{name} expects numbers")),
        }),
    );
}

fn define_compare(rt: &Runtime, name: &'static str, types: &[Rc<Type>], accept: fn(Ordering) -> bool) {
    rt.define_method(
        name,
        types,
        false,
        Value::native_sync(name, move |_, args| match compare(&args[0], &args[1]) {
            Some(ordering) => Value::truth(accept(ordering)),
            None => Value::type_error(format!(
                "cannot compare {} with {}",
                args[0].kind_name(),
                args[1].kind_name()
            )),
        }),
    );
}

/// Ordering between two numbers or two strings.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => a.as_real()?.partial_cmp(&b.as_real()?),
    }
}

/// Structural equality: numbers across integer/real, lists and tuples
/// element-wise, map-key equality for everything else.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Real(y)) | (Value::Real(y), Value::Integer(x)) => *x as f64 == *y,
        (Value::Real(x), Value::Real(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        _ => a.same_key(b),
    }
}

pub fn register(rt: &Runtime) {
    define_int(rt, "+", |a, b| a.checked_add(b).map_or_else(|| overflow("+"), Value::Integer));
    define_int(rt, "-", |a, b| a.checked_sub(b).map_or_else(|| overflow("-"), Value::Integer));
    define_int(rt, "*", |a, b| a.checked_mul(b).map_or_else(|| overflow("*"), Value::Integer));
    define_int(rt, "/", |a, b| {
        if b == 0 {
            return division_by_zero();
        }
        match a.checked_rem(b) {
            Some(0) => a.checked_div(b).map_or_else(|| overflow("/"), Value::Integer),
            Some(_) => Value::Real(a as f64 / b as f64),
            None => overflow("/"),
        }
    });
    define_int(rt, "%", |a, b| {
        if b == 0 {
            division_by_zero()
        } else {
            a.checked_rem_euclid(b).map_or_else(|| overflow("%"), Value::Integer)
        }
    });

    define_real(rt, "+", |a, b| Value::Real(a + b));
    define_real(rt, "-", |a, b| Value::Real(a - b));
    define_real(rt, "*", |a, b| Value::Real(a * b));
    define_real(rt, "/", |a, b| if b == 0.0 { division_by_zero() } else { Value::Real(a / b) });
    define_real(rt, "%", |a, b| if b == 0.0 { division_by_zero() } else { Value::Real(a.rem_euclid(b)) });

    let b = rt.builtins();
    for types in [
        [b.number.clone(), b.number.clone()],
        [b.string.clone(), b.string.clone()],
    ] {
        define_compare(rt, "<", &types, Ordering::is_lt);
        define_compare(rt, "<=", &types, Ordering::is_le);
        define_compare(rt, ">", &types, Ordering::is_gt);
        define_compare(rt, ">=", &types, Ordering::is_ge);
    }

    let any2 = [b.any.clone(), b.any.clone()];
    rt.define_method(
        "=",
        &any2,
        false,
        Value::native_sync("=", |_, args| Value::truth(values_equal(&args[0], &args[1]))),
    );
    rt.define_method(
        "!=",
        &any2,
        false,
        Value::native_sync("!=", |_, args| Value::truth(!values_equal(&args[0], &args[1]))),
    );

    rt.define_method(
        "-",
        &[b.number.clone()],
        false,
        Value::native_sync("-", |_, args| match &args[0] {
            Value::Integer(n) => n.checked_neg().map_or_else(|| overflow("-"), Value::Integer),
            Value::Real(r) => Value::Real(-r),
            other => Value::type_error(format!("cannot negate {}", other.kind_name())),
        }),
    );
    rt.define_method(
        "abs",
        &[b.number.clone()],
        false,
        Value::native_sync("abs", |_, args| match &args[0] {
            Value::Integer(n) => n.checked_abs().map_or_else(|| overflow("abs"), Value::Integer),
            Value::Real(r) => Value::Real(r.abs()),
            other => Value::type_error(format!("abs expects a number, not {}", other.kind_name())),
        }),
    );
    for (name, pick) in [("min", Ordering::is_lt as fn(Ordering) -> bool), ("max", Ordering::is_gt)] {
        rt.define_method(
            name,
            &[b.number.clone()],
            true,
            Value::native_sync(name, move |_, args| {
                let mut best = args[0].clone();
                for arg in &args[1..] {
                    match compare(arg, &best) {
                        Some(ordering) if pick(ordering) => best = arg.clone(),
                        Some(_) => {}
                        None => return Value::type_error(format!("{name} expects numbers")),
                    }
                }
                best
            }),
        );
    }
}
