use super::*;

fn raise_call(line: u32, error_kind: &str, message: &str) -> Vec<Json> {
    vec![
        json!([12, line, error_kind]),
        json!([12, line, message]),
        json!([33, line, global("raise"), 2]),
    ]
}

#[test]
fn test_uncaught_error_collects_trace_through_callers() -> Result<()> {
    let rt = runtime();
    let mut c_code = raise_call(30, "ValueError", "boom");
    c_code.push(json!([0, 31]));
    let c = Block::new("c.kt", c_code);
    let b = Block::new("b.kt", vec![json!([24, 20, 0]), json!([9, 20]), json!([32, 20, 0]), json!([0, 21])]).upvalues(1);
    let a = Block::new("a.kt", vec![json!([24, 10, 0]), json!([9, 10]), json!([32, 10, 0]), json!([0, 11])]).upvalues(1);
    let program = a.closure(vec![b.closure(vec![c.closure(Vec::new())?])?])?;

    let result = run(&rt, &program, Vec::new())?;
    let err = expect_error(&result)?;
    assert_eq!(err.kind(), "ValueError");
    assert_eq!(err.message(), "boom");
    let trace: Vec<(String, u32)> = err.trace().iter().map(|e| (e.source.to_string(), e.line)).collect();
    assert_eq!(
        trace,
        vec![("c.kt".to_string(), 30), ("b.kt".to_string(), 20), ("a.kt".to_string(), 10)]
    );
    Ok(())
}

#[test]
fn test_handler_sees_stack_cut_back_to_try_depth() -> Result<()> {
    let rt = runtime();
    let mut c_code = raise_call(30, "ValueError", "boom");
    c_code.push(json!([0, 31]));
    let c = Block::new("c.kt", c_code);
    let b = Block::new("b.kt", vec![json!([24, 20, 0]), json!([9, 20]), json!([32, 20, 0]), json!([0, 21])]).upvalues(1);
    let a = Block::new(
        "a.kt",
        vec![
            json!([12, 9, 7]),
            json!([16, 9, "@handler"]),
            json!([12, 10, 8]),
            json!([12, 10, 9]),
            json!([24, 10, 0]),
            json!([9, 10]),
            json!([32, 10, 0]),
            json!([0, 10]),
            json!("handler:"),
            json!([17, 11, "@exit", 1]),
            json!([46, 11, 2]),
            json!([0, 11]),
        ],
    )
    .upvalues(1);
    let program = a.closure(vec![b.closure(vec![c.closure(Vec::new())?])?])?;

    let result = run(&rt, &program, Vec::new())?;
    let Value::Tuple(items) = &result else {
        bail!("expected a tuple, got {result:?}");
    };
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], Value::Integer(7)), "got {:?}", items[0]);
    let Value::ErrorValue(err) = &items[1] else {
        bail!("expected a caught error, got {:?}", items[1]);
    };
    assert_eq!(err.kind(), "ValueError");
    assert_eq!(err.message(), "boom");
    let trace: Vec<(String, u32)> = err.trace().iter().map(|e| (e.source.to_string(), e.line)).collect();
    assert_eq!(
        trace,
        vec![("c.kt".to_string(), 30), ("b.kt".to_string(), 20), ("a.kt".to_string(), 10)]
    );
    Ok(())
}

#[test]
fn test_catch_turns_error_into_inspectable_value() -> Result<()> {
    let rt = runtime();
    let mut code = vec![json!([16, 1, "@handler"])];
    code.extend(raise_call(2, "ValueError", "bad"));
    code.extend([
        json!([11, 3, "unreached"]),
        json!([0, 3]),
        json!("handler:"),
        json!([17, 4, "@exit", 0]),
        json!([0, 4]),
    ]);
    let program = Block::new("try.kt", code).closure(Vec::new())?;

    let result = run(&rt, &program, Vec::new())?;
    match &result {
        Value::ErrorValue(err) => {
            assert_eq!(err.message(), "bad");
            assert_eq!(err.trace().first().map(|e| e.line), Some(2));
        }
        other => panic!("expected caught error value, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_catch_type_selects_handler_by_kind() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "kinds.kt",
        vec![
            json!([16, 1, "@handler"]),
            json!([22, 2, 0]),
            json!([22, 2, 1]),
            json!([33, 2, global("raise"), 2]),
            json!([0, 2]),
            json!("handler:"),
            json!([19, 3, "@other", ["ValueError", "RangeError"]]),
            json!([18, 3, "@exit", 0]),
            json!([11, 3, "matched"]),
            json!([0, 3]),
            json!("other:"),
            json!([18, 4, "@exit", 0]),
            json!([11, 4, "other"]),
            json!([0, 4]),
        ],
    )
    .params(&["kind", "message"]);
    let program = block.closure(Vec::new())?;

    let raise = |error_kind: &str| run(&rt, &program, vec![Value::from(error_kind), Value::from("x")]);
    assert_eq!(raise("RangeError")?.to_string(), "matched");
    assert_eq!(raise("TypeError")?.to_string(), "other");
    Ok(())
}

#[test]
fn test_retry_reenters_protected_block() -> Result<()> {
    let rt = runtime();
    let mut code = vec![
        json!([13, 1, 1, 0]),
        json!([11, 1, 0]),
        json!([25, 1, 0]),
        json!("body:"),
        json!([16, 2, "@handler"]),
        json!([22, 3, 0]),
        json!([12, 3, 1]),
        json!([33, 3, method("+"), 2]),
        json!([25, 3, 0]),
        json!([22, 4, 0]),
        json!([12, 4, 3]),
        json!([33, 4, method("<"), 2]),
        json!([6, 4, "@done"]),
    ];
    code.extend(raise_call(5, "ValueError", "again"));
    code.extend([
        json!("done:"),
        json!([21, 6, 0]),
        json!([0, 6]),
        json!("handler:"),
        json!([18, 7, "@body", 1]),
        json!([20, 7]),
    ]);
    let program = Block::new("retry.kt", code).closure(Vec::new())?;

    let result = run(&rt, &program, Vec::new())?.deref_value();
    assert!(matches!(result, Value::Integer(3)), "got {result:?}");
    Ok(())
}

#[test]
fn test_assigning_to_a_constant_raises_at_instruction_line() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "assign.kt",
        vec![json!([12, 1, 1]), json!([11, 2, 2]), json!([30, 2]), json!([0, 3])],
    );
    let program = block.closure(Vec::new())?;

    let result = run(&rt, &program, Vec::new())?;
    let err = expect_error(&result)?;
    assert_eq!(err.kind(), kind::TYPE_ERROR);
    let lines: Vec<u32> = err.trace().iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![2]);
    Ok(())
}

#[test]
fn test_catch_without_error_is_internal_error() -> Result<()> {
    let rt = runtime();
    let block = Block::new("catch.kt", vec![json!([11, 1, "fine"]), json!([17, 1, "@exit", 0])]);
    let program = block.closure(Vec::new())?;

    let err = expect_error(&run(&rt, &program, Vec::new())?)?;
    assert_eq!(err.kind(), kind::INTERNAL_ERROR);
    assert_eq!(err.message(), "expected error, not string");
    Ok(())
}

#[test]
fn test_dispatch_failure_inside_frame_is_catchable() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "dispatch.kt",
        vec![
            json!([16, 1, "@handler"]),
            json!([12, 2, "a"]),
            json!([12, 2, 1]),
            json!([33, 2, method("+"), 2]),
            json!([0, 2]),
            json!("handler:"),
            json!([17, 3, "@exit", 0]),
            json!([0, 3]),
        ],
    );
    let program = block.closure(Vec::new())?;

    match run(&rt, &program, Vec::new())? {
        Value::ErrorValue(err) => {
            assert_eq!(err.kind(), kind::METHOD_ERROR);
            assert_eq!(err.message(), "no method found for +(string, integer)");
        }
        other => panic!("expected caught method error, got {other:?}"),
    }
    Ok(())
}
