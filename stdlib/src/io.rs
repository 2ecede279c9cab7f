//! Console output.
//!
//! `print(fmt, args...)` substitutes `{}` placeholders in order and appends
//! any leftover arguments separated by spaces. Without a leading format
//! string all arguments are joined by spaces. `println` adds a newline and
//! `format` returns the text instead of writing it.

use std::io::Write;

use anyhow::Result;
use kestrel_core::{Runtime, Value};

use crate::define_global;

const IO_ERROR: &str = "IOError";

pub fn format_variadic(args: &[Value]) -> String {
    let Some(Value::String(fmt)) = args.first() else {
        return args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
    };
    let rest = &args[1..];
    let mut out = String::with_capacity(fmt.len() + rest.len() * 8);
    let mut used = 0;
    let mut pieces = fmt.split("{}");
    if let Some(head) = pieces.next() {
        out.push_str(head);
    }
    for piece in pieces {
        match rest.get(used) {
            Some(arg) => {
                out.push_str(&arg.to_string());
                used += 1;
            }
            None => out.push_str("{}"),
        }
        out.push_str(piece);
    }
    for arg in &rest[used..] {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

fn write_stdout(text: &str, newline: bool) -> Value {
    let mut stdout = std::io::stdout().lock();
    let written = if newline {
        writeln!(stdout, "{text}")
    } else {
        write!(stdout, "{text}").and_then(|()| stdout.flush())
    };
    match written {
        Ok(()) => Value::Nil,
        Err(err) => Value::error(IO_ERROR, err.to_string()),
    }
}

pub fn register(rt: &Runtime) -> Result<()> {
    define_global(
        rt,
        "print",
        Value::native_sync("print", |_, args| write_stdout(&format_variadic(args), false)),
    )?;
    define_global(
        rt,
        "println",
        Value::native_sync("println", |_, args| write_stdout(&format_variadic(args), true)),
    )?;
    define_global(
        rt,
        "format",
        Value::native_sync("format", |_, args| Value::from(format_variadic(args))),
    )
}
