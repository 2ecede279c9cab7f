use std::cell::RefCell;
use std::rc::Rc;

use crate::rt::Runtime;
use crate::val::Value;

/// Anything that can receive the result of a computation.
///
/// Frames, chained iterator states and host callbacks all implement this.
/// `resume` is only ever invoked from a scheduler task.
pub trait Continuation {
    fn resume(self: Rc<Self>, rt: &Runtime, value: Value);
}

pub type Caller = Rc<dyn Continuation>;

struct Once<F> {
    func: RefCell<Option<F>>,
}

impl<F> Continuation for Once<F>
where
    F: FnOnce(&Runtime, Value) + 'static,
{
    fn resume(self: Rc<Self>, rt: &Runtime, value: Value) {
        let func = self.func.borrow_mut().take();
        match func {
            Some(func) => func(rt, value),
            None => tracing::warn!(target: "kestrel::sched", "one-shot continuation resumed twice; ignored"),
        }
    }
}

/// Continuation from a closure. A second resume is logged and dropped.
pub fn continuation<F>(func: F) -> Caller
where
    F: FnOnce(&Runtime, Value) + 'static,
{
    Rc::new(Once {
        func: RefCell::new(Some(func)),
    })
}

/// Continuation that stores whatever it receives; used at the host boundary.
pub fn capture() -> (Caller, Rc<RefCell<Option<Value>>>) {
    let slot = Rc::new(RefCell::new(None));
    let sink = slot.clone();
    let caller = continuation(move |_, value| {
        *sink.borrow_mut() = Some(value);
    });
    (caller, slot)
}
