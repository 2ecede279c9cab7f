use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::rt::{BreakpointSet, Debugger};
use crate::vm::Frame;

#[derive(Default)]
struct Recorder {
    points: BreakpointSet,
    hits: RefCell<Vec<(String, u32)>>,
    stacks: RefCell<Vec<usize>>,
}

impl Debugger for Recorder {
    fn breakpoint(&self, source: &str, line: u32) -> bool {
        self.points.contains(source, line)
    }

    fn step_in(&self) -> bool {
        self.points.is_stepping()
    }

    fn run(&self, rt: &Runtime, frame: Rc<Frame>, result: Value) {
        self.hits.borrow_mut().push((frame.source().to_string(), frame.line()));
        self.stacks.borrow_mut().push(frame.stack_snapshot().len());
        frame.debug_continue(rt, result);
    }
}

fn three_lines() -> Result<Json> {
    Block::new(
        "dbg",
        vec![
            json!([13, 1, 1, 0]),
            json!([11, 1, 2]),
            json!([31, 2, 0]),
            json!([11, 3, 5]),
            json!([0, 3]),
        ],
    )
    .closure(Vec::new())
}

#[test]
fn test_breakpoint_pauses_once_per_line() -> Result<()> {
    let recorder = Rc::new(Recorder::default());
    recorder.points.add("dbg", 2);
    let rt = runtime().with_debugger(recorder.clone());

    let result = run(&rt, &three_lines()?, Vec::new())?;
    assert!(matches!(result, Value::Integer(5)));
    assert_eq!(*recorder.hits.borrow(), vec![("dbg".to_string(), 2)]);
    assert_eq!(*recorder.stacks.borrow(), vec![1]);
    Ok(())
}

#[test]
fn test_stepping_pauses_before_every_instruction() -> Result<()> {
    let recorder = Rc::new(Recorder::default());
    recorder.points.set_stepping(true);
    let rt = runtime().with_debugger(recorder.clone());

    let result = run(&rt, &three_lines()?, Vec::new())?;
    assert!(matches!(result, Value::Integer(5)));
    let lines: Vec<u32> = recorder.hits.borrow().iter().map(|(_, line)| *line).collect();
    assert_eq!(lines, vec![1, 1, 2, 3, 3]);
    Ok(())
}

#[test]
fn test_breakpoints_elsewhere_do_not_pause() -> Result<()> {
    let recorder = Rc::new(Recorder::default());
    recorder.points.add("other.kt", 2);
    recorder.points.add("dbg", 9);
    let rt = runtime().with_debugger(recorder.clone());

    run(&rt, &three_lines()?, Vec::new())?;
    assert!(recorder.hits.borrow().is_empty());
    assert!(recorder.points.remove("dbg", 9));
    assert!(!recorder.points.contains("dbg", 9));
    Ok(())
}
