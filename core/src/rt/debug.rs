use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::rt::Runtime;
use crate::val::Value;
use crate::vm::Frame;

/// Hook consulted by running frames.
///
/// A frame checks `step_in` and `breakpoint` whenever its current line
/// changes. When either fires the frame parks itself and hands control to
/// `run`; execution continues only through `Frame::debug_continue`.
pub trait Debugger {
    fn breakpoint(&self, source: &str, line: u32) -> bool;
    fn step_in(&self) -> bool;
    fn run(&self, rt: &Runtime, frame: Rc<Frame>, result: Value);
}

/// Breakpoints keyed by `(source, line)`, plus a step flag.
#[derive(Default)]
pub struct BreakpointSet {
    points: RefCell<FxHashSet<(Rc<str>, u32)>>,
    stepping: Cell<bool>,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self {
            points: RefCell::new(FxHashSet::default()),
            stepping: Cell::new(false),
        }
    }

    pub fn add(&self, source: &str, line: u32) {
        tracing::debug!(target: "kestrel::debug", source, line, "breakpoint added");
        self.points.borrow_mut().insert((Rc::from(source), line));
    }

    pub fn remove(&self, source: &str, line: u32) -> bool {
        tracing::debug!(target: "kestrel::debug", source, line, "breakpoint removed");
        self.points.borrow_mut().remove(&(Rc::from(source), line))
    }

    pub fn clear(&self) {
        self.points.borrow_mut().clear();
    }

    pub fn contains(&self, source: &str, line: u32) -> bool {
        self.points.borrow().contains(&(Rc::from(source), line))
    }

    pub fn set_stepping(&self, stepping: bool) {
        self.stepping.set(stepping);
    }

    pub fn is_stepping(&self) -> bool {
        self.stepping.get()
    }
}
