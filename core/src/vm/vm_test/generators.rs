use super::*;

fn generator() -> Block {
    Block::new(
        "gen.kt",
        vec![
            json!([12, 1, 1]),
            json!([12, 1, 10]),
            json!([1, 1]),
            json!([2, 1]),
            json!([12, 2, 2]),
            json!([12, 2, 20]),
            json!([1, 2]),
            json!([2, 2]),
            json!([3, 3]),
            json!([0, 3]),
        ],
    )
}

/// Sums the values of its upvalue's iteration.
fn summing_loop() -> Block {
    Block::new(
        "sum-loop.kt",
        vec![
            json!([13, 1, 1, 0]),
            json!([11, 1, 0]),
            json!([25, 1, 0]),
            json!([24, 2, 0]),
            json!([36, 2]),
            json!("head:"),
            json!([37, 2, "@end"]),
            json!([40, 3]),
            json!([9, 3]),
            json!([22, 3, 0]),
            json!([33, 3, method("+"), 2]),
            json!([25, 3, 0]),
            json!([38, 3, "@head"]),
            json!("end:"),
            json!([21, 4, 0]),
            json!([0, 4]),
        ],
    )
    .upvalues(1)
}

/// Collects the keys of its upvalue's iteration into a list.
fn key_loop() -> Block {
    Block::new(
        "key-loop.kt",
        vec![
            json!([13, 1, 0, 1]),
            json!([11, 1, ["l"]]),
            json!([27, 1, 0]),
            json!([24, 2, 0]),
            json!([36, 2]),
            json!("head:"),
            json!([37, 2, "@end"]),
            json!([39, 3]),
            json!([9, 3]),
            json!([22, 3, 0]),
            json!([33, 3, global("push"), 2]),
            json!([38, 3, "@head"]),
            json!("end:"),
            json!([21, 4, 0]),
            json!([0, 4]),
        ],
    )
    .upvalues(1)
}

#[test]
fn test_for_loop_over_list_sees_one_based_keys() -> Result<()> {
    let rt = runtime();
    let program = key_loop().closure(vec![json!(["l", "a", "b", "c"])])?;
    assert_eq!(run(&rt, &program, Vec::new())?.to_string(), "[1, 2, 3]");
    Ok(())
}

#[test]
fn test_for_loop_over_map_reads_values_through_nodes() -> Result<()> {
    let rt = runtime();
    let program = summing_loop().closure(vec![json!(["m", "x", 1, "y", 2])])?;
    let total = run(&rt, &program, Vec::new())?.deref_value();
    assert!(matches!(total, Value::Integer(3)));
    Ok(())
}

#[test]
fn test_suspending_closure_acts_as_iterator() -> Result<()> {
    let rt = runtime();
    let sum = summing_loop().closure(vec![generator().closure(Vec::new())?])?;
    let total = run(&rt, &sum, Vec::new())?.deref_value();
    assert!(matches!(total, Value::Integer(30)), "got {total:?}");

    let keys = key_loop().closure(vec![generator().closure(Vec::new())?])?;
    assert_eq!(run(&rt, &keys, Vec::new())?.to_string(), "[1, 2]");
    Ok(())
}

#[test]
fn test_calling_suspended_frame_resumes_it() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "resume.kt",
        vec![json!([12, 1, "k"]), json!([12, 1, "v"]), json!([1, 1]), json!([2, 2]), json!([0, 2])],
    );
    let program = block.closure(Vec::new())?;

    let frame = run(&rt, &program, Vec::new())?;
    let Value::Frame(handle) = &frame else {
        bail!("expected a suspended frame, got {frame:?}");
    };
    assert!(handle.is_suspended());
    assert_eq!(handle.stack_snapshot().len(), 2);

    let resumed = rt.run(frame.clone(), vec![Value::from("sent")])?;
    assert_eq!(resumed.to_string(), "sent");
    assert!(!handle.is_suspended());

    let again = rt.run(frame, vec![Value::Nil])?;
    let err = expect_error(&again)?;
    assert_eq!(err.kind(), kind::STATE_ERROR);
    assert_eq!(err.message(), "Function did not suspend");
    Ok(())
}

#[test]
fn test_finished_frame_reports_done_on_every_advance() -> Result<()> {
    let rt = runtime();
    let block = Block::new(
        "done.kt",
        vec![json!([12, 1, "k"]), json!([12, 1, "v"]), json!([1, 1]), json!([2, 2]), json!([0, 2])],
    );
    let frame = run(&rt, &block.closure(Vec::new())?, Vec::new())?;
    assert!(matches!(frame, Value::Frame(_)), "got {frame:?}");
    rt.run(frame.clone(), vec![Value::Nil])?;

    for _ in 0..2 {
        let target = frame.clone();
        let advance = Value::native("advance", move |rt, caller, _| rt.iter_next(caller, target.clone()));
        let next = rt.run(advance, Vec::new())?;
        assert!(next.is_nil(), "got {next:?}");
    }
    Ok(())
}
