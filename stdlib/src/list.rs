//! List and tuple methods plus the `list`, `tuple` and `range` constructors.

use std::cmp::Ordering;

use kestrel_core::val::error::kind;
use kestrel_core::val::list::resolve_index;
use kestrel_core::{Runtime, Value};

use crate::number::{compare, values_equal};

fn items(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.borrow().clone(),
        Value::Tuple(items) => items.to_vec(),
        _ => Vec::new(),
    }
}

pub fn register(rt: &Runtime) {
    let b = rt.builtins();
    let list = b.list.clone();

    rt.define_constructor(
        &b.list,
        &[],
        true,
        Value::native_sync("list::of", |_, args| Value::list(args.to_vec())),
    );
    rt.define_constructor(
        &b.tuple,
        &[],
        true,
        Value::native_sync("tuple::of", |_, args| Value::tuple(args.to_vec())),
    );
    let ints = [b.integer.clone(), b.integer.clone()];
    rt.define_constructor(
        &b.range,
        &ints,
        false,
        Value::native_sync("range::of", |_, args| {
            Value::Range(args[0].as_int().unwrap_or_default(), args[1].as_int().unwrap_or_default())
        }),
    );
    rt.define_method(
        "..",
        &ints,
        false,
        Value::native_sync("..", |_, args| {
            Value::Range(args[0].as_int().unwrap_or_default(), args[1].as_int().unwrap_or_default())
        }),
    );

    for ty in [list.clone(), b.tuple.clone()] {
        rt.define_method(
            "length",
            &[ty.clone()],
            false,
            Value::native_sync("length", |_, args| Value::Integer(items(&args[0]).len() as i64)),
        );
        rt.define_method(
            "contains",
            &[ty, b.any.clone()],
            false,
            Value::native_sync("contains", |_, args| {
                Value::truth(items(&args[0]).iter().any(|item| values_equal(item, &args[1])))
            }),
        );
    }

    // `at` on a list yields the slot itself so that assigning through it
    // updates the list.
    rt.define_method(
        "at",
        &[list.clone(), b.integer.clone()],
        false,
        Value::native_sync("at", |_, args| {
            let Value::List(items) = &args[0] else {
                return Value::Nil;
            };
            let len = items.borrow().len();
            match resolve_index(len, args[1].as_int().unwrap_or_default()) {
                Some(index) => Value::ListSlot {
                    list: items.clone(),
                    index,
                },
                None => Value::Nil,
            }
        }),
    );
    rt.define_method(
        "at",
        &[b.tuple.clone(), b.integer.clone()],
        false,
        Value::native_sync("at", |_, args| {
            let items = items(&args[0]);
            resolve_index(items.len(), args[1].as_int().unwrap_or_default())
                .map_or(Value::Nil, |index| items[index].clone())
        }),
    );
    rt.define_method(
        "push",
        &[list.clone()],
        true,
        Value::native_sync("push", |_, args| {
            if let Value::List(items) = &args[0] {
                items.borrow_mut().extend(args[1..].iter().cloned());
            }
            args[0].clone()
        }),
    );
    rt.define_method(
        "pop",
        &[list.clone()],
        false,
        Value::native_sync("pop", |_, args| match &args[0] {
            Value::List(items) => items.borrow_mut().pop().unwrap_or(Value::Nil),
            _ => Value::Nil,
        }),
    );
    rt.define_method(
        "reverse",
        &[list.clone()],
        false,
        Value::native_sync("reverse", |_, args| {
            let mut items = items(&args[0]);
            items.reverse();
            Value::list(items)
        }),
    );
    rt.define_method(
        "+",
        &[list.clone(), list.clone()],
        false,
        Value::native_sync("+", |_, args| {
            let mut joined = items(&args[0]);
            joined.extend(items(&args[1]));
            Value::list(joined)
        }),
    );
    rt.define_method(
        "join",
        &[list.clone(), b.string.clone()],
        false,
        Value::native_sync("join", |_, args| {
            let separator = args[1].as_str().unwrap_or_default();
            let parts: Vec<String> = items(&args[0]).iter().map(Value::to_string).collect();
            Value::from(parts.join(separator))
        }),
    );
    rt.define_method(
        "sort",
        &[list],
        false,
        Value::native_sync("sort", |_, args| {
            let mut items = items(&args[0]);
            let mut incomparable = None;
            items.sort_by(|a, b| {
                compare(a, b).unwrap_or_else(|| {
                    incomparable.get_or_insert_with(|| (a.kind_name(), b.kind_name()));
                    Ordering::Equal
                })
            });
            match incomparable {
                Some((a, b)) => Value::error(kind::TYPE_ERROR, format!("cannot compare {a} with {b}")),
                None => Value::list(items),
            }
        }),
    );
}
