use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::val::Value;

/// Error kinds raised by the runtime itself. User code may use any string.
pub mod kind {
    pub const TYPE_ERROR: &str = "TypeError";
    pub const METHOD_ERROR: &str = "MethodError";
    pub const NAME_ERROR: &str = "NameError";
    pub const STATE_ERROR: &str = "StateError";
    pub const INTERNAL_ERROR: &str = "InternalError";
    pub const VALUE_ERROR: &str = "ValueError";
    pub const RANGE_ERROR: &str = "RangeError";
    pub const SHAPE_ERROR: &str = "ShapeError";
    pub const ARRAY_ERROR: &str = "ArrayError";
    pub const UNSUPPORTED_ERROR: &str = "UnsupportedError";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub source: Rc<str>,
    pub line: u32,
}

/// Payload shared by in-flight errors and caught error values.
pub struct ErrorValue {
    kind: Rc<str>,
    message: String,
    trace: RefCell<Vec<TraceEntry>>,
}

impl ErrorValue {
    pub fn new(kind: &str, message: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            kind: Rc::from(kind),
            message: message.into(),
            trace: RefCell::new(Vec::new()),
        })
    }

    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Snapshot of the trace, innermost frame first.
    pub fn trace(&self) -> Vec<TraceEntry> {
        self.trace.borrow().clone()
    }

    pub fn push_trace(&self, source: &Rc<str>, line: u32) {
        self.trace.borrow_mut().push(TraceEntry {
            source: source.clone(),
            line,
        });
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorValue")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("trace", &self.trace.borrow())
            .finish()
    }
}

impl Value {
    /// An in-flight error. Handing this to a frame unwinds to its handler.
    pub fn error(kind: &str, message: impl Into<String>) -> Value {
        Value::Error(ErrorValue::new(kind, message))
    }

    pub fn type_error(message: impl Into<String>) -> Value {
        Value::error(kind::TYPE_ERROR, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Value {
        Value::error(kind::INTERNAL_ERROR, message)
    }
}
