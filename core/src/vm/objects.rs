//! Host constructors referenced by `["o", key, args...]` in programs.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Result, bail};
use rustc_hash::FxHashMap;

use crate::rt::Runtime;
use crate::val::{Dereferenceable, MapValue, Type, Value};

pub type ObjectConstructor = Rc<dyn Fn(&Runtime, Vec<Value>) -> Result<Value>>;

pub struct ObjectRegistry {
    constructors: RefCell<FxHashMap<String, ObjectConstructor>>,
}

impl ObjectRegistry {
    /// A registry without any constructors.
    pub fn empty() -> Self {
        Self {
            constructors: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn register(&self, key: &str, constructor: impl Fn(&Runtime, Vec<Value>) -> Result<Value> + 'static) {
        self.constructors
            .borrow_mut()
            .insert(key.to_string(), Rc::new(constructor));
    }

    pub fn get(&self, key: &str) -> Option<ObjectConstructor> {
        self.constructors.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constructors.borrow().contains_key(key)
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        registry.register("type-switch", type_switch);
        registry.register("string-switch", string_switch);
        registry.register("number-switch", number_switch);
        registry.register("map-template", map_template);
        registry
    }
}

fn case_items(case: &Value) -> Vec<Value> {
    match case.deref_value() {
        Value::List(items) => items.borrow().clone(),
        Value::Tuple(items) => items.to_vec(),
        other => vec![other],
    }
}

fn index_value(index: usize) -> Value {
    Value::Integer(index as i64)
}

fn type_switch(_rt: &Runtime, cases: Vec<Value>) -> Result<Value> {
    let mut table: Vec<Vec<Rc<Type>>> = Vec::with_capacity(cases.len());
    for case in &cases {
        let mut types = Vec::new();
        for item in case_items(case) {
            match item {
                Value::Type(ty) => types.push(ty),
                other => bail!("type-switch case expects types, found {}", other.kind_name()),
            }
        }
        table.push(types);
    }
    Ok(Value::native_sync("type-switch", move |rt, args| {
        let value = args.first().cloned().unwrap_or(Value::Nil);
        let ty = rt.type_of(&value);
        let found = table.iter().position(|types| types.iter().any(|case| ty.is_a(case)));
        index_value(found.unwrap_or(table.len()))
    }))
}

fn string_switch(_rt: &Runtime, cases: Vec<Value>) -> Result<Value> {
    let mut table = Vec::with_capacity(cases.len());
    for case in &cases {
        let items = case_items(case);
        if let Some(bad) = items.iter().find(|item| !matches!(item, Value::String(_) | Value::Regex(_))) {
            bail!("string-switch case expects strings or regexes, found {}", bad.kind_name());
        }
        table.push(items);
    }
    Ok(Value::native_sync("string-switch", move |_rt, args| {
        let Some(Value::String(text)) = args.first() else {
            let found = args.first().map(Value::kind_name).unwrap_or_default();
            return Value::type_error(format!("expected string, not {found}"));
        };
        let found = table.iter().position(|items| {
            items.iter().any(|item| match item {
                Value::String(case) => case == text,
                Value::Regex(regex) => regex.is_match(text),
                _ => false,
            })
        });
        index_value(found.unwrap_or(table.len()))
    }))
}

fn number_switch(_rt: &Runtime, cases: Vec<Value>) -> Result<Value> {
    let mut table: Vec<Vec<(i64, i64)>> = Vec::with_capacity(cases.len());
    for case in &cases {
        let mut ranges = Vec::new();
        for item in case_items(case) {
            match item {
                Value::Integer(n) => ranges.push((n, n)),
                bounds @ (Value::List(_) | Value::Tuple(_)) => match case_items(&bounds).as_slice() {
                    [Value::Integer(lo), Value::Integer(hi)] => ranges.push((*lo, *hi)),
                    _ => bail!("number-switch range must be [min, max]"),
                },
                other => bail!("number-switch case expects integers, found {}", other.kind_name()),
            }
        }
        table.push(ranges);
    }
    Ok(Value::native_sync("number-switch", move |_rt, args| {
        let n = match args.first() {
            Some(Value::Integer(n)) => *n,
            Some(Value::Real(x)) => *x as i64,
            other => {
                let found = other.map(Value::kind_name).unwrap_or_default();
                return Value::type_error(format!("expected number, not {found}"));
            }
        };
        let found = table
            .iter()
            .position(|ranges| ranges.iter().any(|&(lo, hi)| lo <= n && n <= hi));
        index_value(found.unwrap_or(table.len()))
    }))
}

fn map_template(_rt: &Runtime, names: Vec<Value>) -> Result<Value> {
    let keys = names.into_iter().map(|name| name.deref_value()).collect::<Vec<_>>();
    Ok(Value::native_sync("map-template", move |_rt, args| {
        let map = MapValue::new();
        for (key, value) in keys.iter().zip(args.iter().chain(std::iter::repeat(&Value::Nil))) {
            map.insert(key.clone(), value.clone());
        }
        Value::Map(map)
    }))
}
