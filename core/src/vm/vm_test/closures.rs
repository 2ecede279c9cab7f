use super::*;

#[test]
fn test_closures_share_captured_variable() -> Result<()> {
    let rt = runtime();
    let increment = Block::new(
        "inc.kt",
        vec![
            json!([24, 1, 0]),
            json!([9, 1]),
            json!([24, 1, 0]),
            json!([9, 1]),
            json!([12, 1, 1]),
            json!([33, 1, method("+"), 2]),
            json!([30, 1]),
            json!([0, 1]),
        ],
    )
    .upvalues(1);
    let outer = Block::new(
        "counter.kt",
        vec![
            json!([13, 1, 1, 0]),
            json!([11, 1, 0]),
            json!([25, 1, 0]),
            json!([49, 2, increment.info()?, 0]),
            json!([0, 2]),
        ],
    );
    let program = outer.closure(Vec::new())?;

    let counter = run(&rt, &program, Vec::new())?;
    assert!(matches!(counter, Value::Closure(_)));
    for expected in 1..=3 {
        let value = rt.run(counter.clone(), Vec::new())?;
        assert!(matches!(value, Value::Integer(n) if n == expected), "got {value:?}");
    }
    Ok(())
}

fn parity_branch(source: &'static str, base: Json) -> Block {
    Block::new(
        source,
        vec![
            json!([22, 1, 0]),
            json!([12, 1, 0]),
            json!([33, 1, method("="), 2]),
            json!([6, 1, "@recur"]),
            base,
            json!([0, 1]),
            json!("recur:"),
            json!([24, 2, 0]),
            json!([9, 2]),
            json!([22, 2, 0]),
            json!([12, 2, 1]),
            json!([33, 2, method("-"), 2]),
            json!([9, 2]),
            json!([34, 2, 1]),
        ],
    )
    .params(&["n"])
    .upvalues(1)
}

#[test]
fn test_forward_references_resolve_through_placeholders() -> Result<()> {
    let rt = runtime();
    let even = parity_branch("even.kt", json!([5, 1]));
    let odd = parity_branch("odd.kt", json!([3, 1]));
    let outer = Block::new(
        "parity.kt",
        vec![
            json!([13, 1, 0, 2]),
            json!([49, 2, even.info()?, 2]),
            json!([28, 2, 1]),
            json!([49, 3, odd.info()?, 1]),
            json!([28, 3, 2]),
            json!([22, 4, 1]),
            json!([22, 4, 0]),
            json!([32, 4, 1]),
            json!([0, 4]),
        ],
    )
    .params(&["n"]);
    let program = outer.closure(Vec::new())?;

    assert!(matches!(run(&rt, &program, vec![Value::from(10)])?, Value::Some));
    assert!(run(&rt, &program, vec![Value::from(7)])?.is_nil());
    Ok(())
}

#[test]
fn test_calling_unresolved_placeholder_is_name_error() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "early.kt",
        vec![
            json!([13, 1, 0, 1]),
            json!([23, 1, 0, "later"]),
            json!([9, 1]),
            json!([32, 1, 0]),
            json!([0, 1]),
        ],
    );
    let program = block.closure(Vec::new())?;

    let err = expect_error(&run(&rt, &program, Vec::new())?)?;
    assert_eq!(err.kind(), kind::NAME_ERROR);
    assert_eq!(err.message(), "later called before it was defined");
    Ok(())
}

#[test]
fn test_partial_application_fills_gaps_in_order() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "partial.kt",
        vec![
            json!([11, 1, global("list")]),
            json!([47, 1, 3]),
            json!([11, 1, "a"]),
            json!([48, 1, 0]),
            json!([11, 1, "c"]),
            json!([48, 1, 2]),
            json!([10, 1]),
            json!([9, 1]),
            json!([12, 1, "b"]),
            json!([12, 1, "d"]),
            json!([32, 1, 2]),
            json!([0, 1]),
        ],
    );
    let program = block.closure(Vec::new())?;
    assert_eq!(run(&rt, &program, Vec::new())?.to_string(), "[a, b, c, d]");
    Ok(())
}

fn list_of_params(source: &'static str, params: &[&'static str]) -> Block {
    Block::new(
        source,
        vec![
            json!([22, 1, 0]),
            json!([22, 1, 1]),
            json!([33, 1, global("list"), 2]),
            json!([0, 1]),
        ],
    )
    .params(params)
}

#[test]
fn test_named_arguments_bind_by_parameter_name() -> Result<()> {
    let rt = runtime();
    let program = list_of_params("named.kt", &["a", "b"]).closure(Vec::new())?;

    let result = run(&rt, &program, vec![Value::names(["b"]), Value::from(5)])?;
    assert_eq!(result.to_string(), "[nil, 5]");

    let result = run(&rt, &program, vec![Value::from(1), Value::names(["c"]), Value::from(2)])?;
    let err = expect_error(&result)?;
    assert_eq!(err.kind(), kind::NAME_ERROR);
    assert_eq!(err.message(), "Unknown named parameter c");
    Ok(())
}

#[test]
fn test_extra_and_named_collectors() -> Result<()> {
    let rt = runtime();
    let rest = list_of_params("rest.kt", &["a", "rest"]).extra().closure(Vec::new())?;
    let result = run(&rt, &rest, vec![Value::from(1), Value::from(2), Value::from(3)])?;
    assert_eq!(result.to_string(), "[1, [2, 3]]");

    let options = list_of_params("opts.kt", &["a", "options"]).named().closure(Vec::new())?;
    let result = run(&rt, &options, vec![Value::from(1), Value::names(["x"]), Value::from(9)])?;
    assert_eq!(result.to_string(), "[1, {x is 9}]");
    Ok(())
}

#[test]
fn test_missing_positional_arguments_are_nil() -> Result<()> {
    let rt = runtime();
    let program = list_of_params("short.kt", &["a", "b"]).closure(Vec::new())?;
    assert_eq!(run(&rt, &program, vec![Value::from(1)])?.to_string(), "[1, nil]");
    Ok(())
}
