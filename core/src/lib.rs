//! Execution core for kestrel.
//!
//! Everything runs on a single thread inside a [`Runtime`]: values are
//! reference counted, control flow is continuation passing, and the
//! scheduler trampolines every step so deep recursion never grows the
//! host stack.

pub mod dispatch;
pub mod iter;
pub mod rt;
pub mod val;
pub mod vm;

pub use rt::{Caller, Runtime, RuntimeConfig, continuation};
pub use val::Value;
