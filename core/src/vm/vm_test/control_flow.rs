use super::*;

fn sum_block() -> Block {
    // sum(n, acc) = if n = 0 then acc else sum(n - 1, acc + n)
    Block::new(
        "sum.kt",
        vec![
            json!([22, 1, 0]),
            json!([12, 1, 0]),
            json!([33, 1, method("="), 2]),
            json!([6, 1, "@recur"]),
            json!([21, 2, 1]),
            json!([0, 2]),
            json!("recur:"),
            json!([24, 3, 0]),
            json!([9, 3]),
            json!([22, 3, 0]),
            json!([12, 3, 1]),
            json!([33, 3, method("-"), 2]),
            json!([9, 3]),
            json!([22, 3, 1]),
            json!([22, 3, 0]),
            json!([33, 3, method("+"), 2]),
            json!([9, 3]),
            json!([34, 3, 2]),
        ],
    )
    .params(&["n", "acc"])
    .upvalues(1)
}

#[test]
fn test_tail_call_runs_in_constant_host_stack() -> Result<()> {
    let rt = runtime();
    let program = sum_block().recursive()?;
    let result = run(&rt, &program, vec![Value::from(1_000_000), Value::from(0)])?;
    assert!(matches!(result, Value::Integer(500_000_500_000)), "got {result:?}");
    Ok(())
}

pub(super) fn factorial_block() -> Block {
    // fact(n) = if n = 0 then 1 else n * fact(n - 1)
    Block::new(
        "fact.kt",
        vec![
            json!([22, 1, 0]),
            json!([12, 1, 0]),
            json!([33, 1, method("="), 2]),
            json!([6, 1, "@recur"]),
            json!([11, 1, 1]),
            json!([0, 1]),
            json!("recur:"),
            json!([22, 2, 0]),
            json!([24, 2, 0]),
            json!([9, 2]),
            json!([22, 2, 0]),
            json!([12, 2, 1]),
            json!([33, 2, method("-"), 2]),
            json!([9, 2]),
            json!([32, 2, 1]),
            json!([9, 2]),
            json!([33, 2, method("*"), 2]),
            json!([0, 2]),
        ],
    )
    .params(&["n"])
    .upvalues(1)
}

#[test]
fn test_recursive_call_returns_through_frames() -> Result<()> {
    let rt = runtime();
    let program = factorial_block().recursive()?;
    let result = run(&rt, &program, vec![Value::from(10)])?;
    assert!(matches!(result, Value::Integer(3_628_800)));
    Ok(())
}

#[test]
fn test_and_or_not_short_circuit() -> Result<()> {
    let rt = runtime();
    // x and "yes" or "no"
    let block = Block::new(
        "logic.kt",
        vec![
            json!([21, 1, 0]),
            json!([6, 1, "@else"]),
            json!([11, 1, "yes"]),
            json!([15, 1, "@done"]),
            json!("else:"),
            json!([8, 1]),
            json!([7, 1, "@no"]),
            json!([11, 1, "unreachable"]),
            json!([15, 1, "@done"]),
            json!("no:"),
            json!([11, 1, "no"]),
            json!("done:"),
            json!([0, 1]),
        ],
    )
    .params(&["x"]);
    let program = block.closure(Vec::new())?;
    assert_eq!(run(&rt, &program, vec![Value::from(1)])?.to_string(), "yes");
    assert_eq!(run(&rt, &program, vec![Value::Nil])?.to_string(), "no");
    Ok(())
}

#[test]
fn test_switch_clamps_to_last_target() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "switch.kt",
        vec![
            json!([21, 1, 0]),
            json!([50, 1, ["@zero", "@one", "@other"]]),
            json!("zero:"),
            json!([11, 2, "zero"]),
            json!([0, 2]),
            json!("one:"),
            json!([11, 3, "one"]),
            json!([0, 3]),
            json!("other:"),
            json!([11, 4, "other"]),
            json!([0, 4]),
        ],
    )
    .params(&["n"]);
    let program = block.closure(Vec::new())?;
    let pick = |n: i64| run(&rt, &program, vec![Value::from(n)]).map(|v| v.to_string());
    assert_eq!(pick(0)?, "zero");
    assert_eq!(pick(1)?, "one");
    assert_eq!(pick(7)?, "other");
    assert_eq!(pick(-1)?, "other");

    let result = run(&rt, &program, vec![Value::from("x")])?;
    assert_eq!(expect_error(&result)?.kind(), kind::TYPE_ERROR);
    Ok(())
}

#[test]
fn test_string_interpolation_builds_through_append() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "fmt.kt",
        vec![
            json!([52, 1]),
            json!([54, 1, "x = "]),
            json!([22, 1, 0]),
            json!([53, 1, 1]),
            json!([54, 1, "!"]),
            json!([55, 1]),
            json!([0, 1]),
        ],
    )
    .params(&["x"]);
    let program = block.closure(Vec::new())?;
    let result = run(&rt, &program, vec![Value::from(42)])?;
    assert!(matches!(&result, Value::String(s) if &**s == "x = 42!"));
    Ok(())
}

#[test]
fn test_collections_and_destructuring() -> Result<()> {
    let rt = runtime();
    // let (a, b) = (10, 4); {"a": 1, "a": b, "diff": a - b}
    let block = Block::new(
        "data.kt",
        vec![
            json!([13, 1, 0, 2]),
            json!([12, 1, 10]),
            json!([12, 1, 4]),
            json!([46, 1, 2]),
            json!([29, 1, 0, 2]),
            json!([44, 2]),
            json!([12, 2, "a"]),
            json!([11, 2, 1]),
            json!([45, 2]),
            json!([12, 2, "a"]),
            json!([21, 2, 1]),
            json!([45, 2]),
            json!([12, 2, "diff"]),
            json!([22, 2, 0]),
            json!([22, 2, 1]),
            json!([33, 2, method("-"), 2]),
            json!([45, 2]),
            json!([10, 2]),
            json!([0, 2]),
        ],
    );
    let program = block.closure(Vec::new())?;
    let result = run(&rt, &program, Vec::new())?;
    assert_eq!(result.to_string(), "{a is 4, diff is 6}");
    Ok(())
}

#[test]
fn test_list_literal_and_append() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "list.kt",
        vec![
            json!([42, 1]),
            json!([11, 1, "a"]),
            json!([43, 1]),
            json!([21, 1, 0]),
            json!([43, 1]),
            json!([10, 1]),
            json!([0, 1]),
        ],
    )
    .params(&["x"]);
    let program = block.closure(Vec::new())?;
    let result = run(&rt, &program, vec![Value::from(2.5)])?;
    assert_eq!(result.to_string(), "[a, 2.5]");
    Ok(())
}

#[test]
fn test_list_append_of_slot_into_same_list() -> Result<()> {
    let rt = runtime();
    rt.globals().define(
        "first-slot",
        Value::native_sync("first-slot", |_, args| match &args[0] {
            Value::List(items) => Value::ListSlot {
                list: items.clone(),
                index: 0,
            },
            other => Value::type_error(format!("expected list, not {}", other.kind_name())),
        }),
    );
    let block = Block::new(
        "slots.kt",
        vec![
            json!([42, 1]),
            json!([11, 1, "a"]),
            json!([43, 1]),
            json!([22, 2, 0]),
            json!([33, 2, global("first-slot"), 1]),
            json!([43, 2]),
            json!([10, 2]),
            json!([0, 2]),
        ],
    );
    let program = block.closure(Vec::new())?;
    let result = run(&rt, &program, Vec::new())?;
    assert_eq!(result.to_string(), "[a, a]");
    Ok(())
}

#[test]
fn test_resolve_calls_member_lookup() -> Result<()> {
    let rt = runtime();
    let module = crate::val::Module::new("geo");
    module.set_export("origin", Value::from(0));
    rt.globals().define("geo", Value::Module(module));
    let block = Block::new(
        "resolve.kt",
        vec![json!([11, 1, global("geo")]), json!([51, 1, "origin"]), json!([0, 1])],
    );
    let program = block.closure(Vec::new())?;
    assert!(matches!(run(&rt, &program, Vec::new())?, Value::Integer(0)));
    Ok(())
}
