//! Map methods and the `map` constructor.

use kestrel_core::val::error::kind;
use kestrel_core::val::MapValue;
use kestrel_core::{Runtime, Value};

pub fn register(rt: &Runtime) {
    let b = rt.builtins();
    let map = b.map.clone();

    // map(k1, v1, k2, v2, ...)
    rt.define_constructor(
        &b.map,
        &[],
        true,
        Value::native_sync("map::of", |_, args| {
            if args.len() % 2 != 0 {
                return Value::error(kind::VALUE_ERROR, "map expects key/value pairs");
            }
            let pairs = args.chunks(2).map(|pair| (pair[0].clone(), pair[1].clone()));
            Value::Map(MapValue::from_pairs(pairs))
        }),
    );
    rt.define_method(
        "length",
        &[map.clone()],
        false,
        Value::native_sync("length", |_, args| match &args[0] {
            Value::Map(map) => Value::Integer(map.len() as i64),
            _ => Value::Nil,
        }),
    );
    rt.define_method(
        "keys",
        &[map.clone()],
        false,
        Value::native_sync("keys", |_, args| match &args[0] {
            Value::Map(map) => Value::list(map.nodes().iter().map(|node| node.key().clone()).collect()),
            _ => Value::Nil,
        }),
    );
    rt.define_method(
        "values",
        &[map.clone()],
        false,
        Value::native_sync("values", |_, args| match &args[0] {
            Value::Map(map) => Value::list(map.nodes().iter().map(|node| node.value()).collect()),
            _ => Value::Nil,
        }),
    );
    rt.define_method(
        "has",
        &[map.clone(), b.any.clone()],
        false,
        Value::native_sync("has", |_, args| match &args[0] {
            Value::Map(map) => Value::truth(map.node(&args[1]).is_some()),
            _ => Value::Nil,
        }),
    );
    // The index is assignable: reading it looks the key up, assigning
    // inserts or overwrites.
    rt.define_method(
        "at",
        &[map.clone(), b.any.clone()],
        false,
        Value::native_sync("at", |_, args| match &args[0] {
            Value::Map(map) => map.index(args[1].clone()),
            _ => Value::Nil,
        }),
    );
    rt.define_method(
        "remove",
        &[map.clone(), b.any.clone()],
        false,
        Value::native_sync("remove", |_, args| match &args[0] {
            Value::Map(map) => map.remove(&args[1]).unwrap_or(Value::Nil),
            _ => Value::Nil,
        }),
    );
    rt.define_method(
        "+",
        &[map.clone(), map],
        false,
        Value::native_sync("+", |_, args| {
            let merged = MapValue::new();
            for side in &args[..2] {
                if let Value::Map(map) = side {
                    for node in map.nodes() {
                        merged.insert(node.key().clone(), node.value());
                    }
                }
            }
            Value::Map(merged)
        }),
    );
}
