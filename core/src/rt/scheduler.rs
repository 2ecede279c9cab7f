//! Trampoline that keeps the host stack flat.
//!
//! Every call, resume and iterator step is pushed as a task. Only the
//! outermost `schedule` drains the queue; nested schedules just enqueue.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::rt::Runtime;

pub type Task = Box<dyn FnOnce(&Runtime)>;

pub struct Scheduler {
    queue: RefCell<VecDeque<Task>>,
    running: Cell<bool>,
    steps: Cell<u64>,
    high_water: Cell<usize>,
    warn_at: usize,
}

/// Clears the running flag however the drain ends.
struct DrainGuard<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> DrainGuard<'a> {
    fn enter(scheduler: &'a Scheduler) -> Self {
        scheduler.running.set(true);
        Self { scheduler }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.running.set(false);
        if std::thread::panicking() {
            self.scheduler.queue.borrow_mut().clear();
        }
    }
}

impl Scheduler {
    pub fn new(warn_at: usize) -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            running: Cell::new(false),
            steps: Cell::new(0),
            high_water: Cell::new(0),
            warn_at,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Tasks executed since the runtime was created.
    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Largest queue length observed.
    #[inline]
    pub fn high_water(&self) -> usize {
        self.high_water.get()
    }

    pub(crate) fn push(&self, task: Task) {
        let mut queue = self.queue.borrow_mut();
        queue.push_back(task);
        let len = queue.len();
        if len > self.high_water.get() {
            self.high_water.set(len);
            if len == self.warn_at {
                tracing::warn!(target: "kestrel::sched", pending = len, "scheduler queue is growing");
            }
        }
    }

    fn pop(&self) -> Option<Task> {
        self.queue.borrow_mut().pop_front()
    }

    /// Enqueue, then drain unless a drain is already in progress.
    pub(crate) fn schedule(&self, rt: &Runtime, task: Task) {
        self.push(task);
        if self.running.get() {
            return;
        }
        let _guard = DrainGuard::enter(self);
        let start = self.steps.get();
        while let Some(task) = self.pop() {
            self.steps.set(self.steps.get() + 1);
            task(rt);
        }
        tracing::trace!(target: "kestrel::sched", steps = self.steps.get() - start, "queue drained");
    }
}
