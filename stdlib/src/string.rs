//! String and string buffer methods.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use kestrel_core::val::error::kind;
use kestrel_core::{Runtime, Value};

fn text(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn strings(items: impl IntoIterator<Item = String>) -> Value {
    Value::list(items.into_iter().map(Value::from).collect())
}

fn define_unary(rt: &Runtime, name: &'static str, op: fn(&str) -> Value) {
    let string = rt.builtins().string.clone();
    rt.define_method(name, &[string], false, Value::native_sync(name, move |_, args| op(text(&args[0]))));
}

pub fn register(rt: &Runtime) {
    let b = rt.builtins();
    let string = b.string.clone();

    define_unary(rt, "length", |s| Value::Integer(s.chars().count() as i64));
    define_unary(rt, "upper", |s| Value::from(s.to_uppercase()));
    define_unary(rt, "lower", |s| Value::from(s.to_lowercase()));
    define_unary(rt, "trim", |s| Value::from(s.trim()));
    define_unary(rt, "chars", |s| strings(s.chars().map(String::from)));

    rt.define_method(
        "+",
        &[string.clone(), b.any.clone()],
        false,
        Value::native_sync("+", |_, args| Value::from(format!("{}{}", args[0], args[1]))),
    );
    rt.define_method(
        "*",
        &[string.clone(), b.integer.clone()],
        false,
        Value::native_sync("*", |_, args| match usize::try_from(args[1].as_int().unwrap_or_default()) {
            Ok(count) => Value::from(text(&args[0]).repeat(count)),
            Err(_) => Value::error(kind::VALUE_ERROR, "cannot repeat a string a negative number of times"),
        }),
    );
    rt.define_method(
        "split",
        &[string.clone(), string.clone()],
        false,
        Value::native_sync("split", |_, args| {
            let (s, sep) = (text(&args[0]), text(&args[1]));
            if sep.is_empty() {
                strings(s.chars().map(String::from))
            } else {
                strings(s.split(sep).map(String::from))
            }
        }),
    );
    rt.define_method(
        "contains",
        &[string.clone(), string.clone()],
        false,
        Value::native_sync("contains", |_, args| Value::truth(text(&args[0]).contains(text(&args[1])))),
    );
    rt.define_method(
        "contains",
        &[string.clone(), b.regex.clone()],
        false,
        Value::native_sync("contains", |_, args| match &args[1] {
            Value::Regex(regex) => Value::truth(regex.is_match(text(&args[0]))),
            _ => Value::Nil,
        }),
    );
    // Capture groups of the first match, group 0 first; nil without a match.
    rt.define_method(
        "match",
        &[string.clone(), b.regex.clone()],
        false,
        Value::native_sync("match", |_, args| {
            let Value::Regex(regex) = &args[1] else {
                return Value::Nil;
            };
            match regex.captures(text(&args[0])) {
                Some(captures) => Value::list(
                    captures
                        .iter()
                        .map(|group| group.map_or(Value::Nil, |m| Value::from(m.as_str())))
                        .collect(),
                ),
                None => Value::Nil,
            }
        }),
    );
    rt.define_method(
        "replace",
        &[string.clone(), b.regex.clone(), string.clone()],
        false,
        Value::native_sync("replace", |_, args| match &args[1] {
            Value::Regex(regex) => Value::from(regex.replace_all(text(&args[0]), text(&args[2])).into_owned()),
            _ => args[0].clone(),
        }),
    );

    // Calling the stringbuffer type starts a buffer with its arguments.
    rt.define_constructor(
        &b.string_buffer,
        &[],
        true,
        Value::native_sync("stringbuffer::of", |_, args| {
            let mut buffer = String::new();
            for value in args {
                let _ = write!(buffer, "{value}");
            }
            Value::StringBuffer(Rc::new(RefCell::new(buffer)))
        }),
    );
    rt.define_method(
        "length",
        &[b.string_buffer.clone()],
        false,
        Value::native_sync("length", |_, args| match &args[0] {
            Value::StringBuffer(buffer) => Value::Integer(buffer.borrow().chars().count() as i64),
            _ => Value::Nil,
        }),
    );
    rt.define_method(
        "to-string",
        &[b.any.clone()],
        false,
        Value::native_sync("to-string", |_, args| Value::from(args[0].to_string())),
    );
}
