//! Bytecode closures and the frame interpreter that runs them.
//!
//! Programs arrive in a serialized array form produced by an external
//! compiler; `decode` turns that into closures and `encode` writes them
//! back out.

mod closure;
mod decode;
mod encode;
mod frame;
pub mod objects;
mod opcode;

pub use closure::{Closure, ClosureInfo};
pub use decode::{BYTECODE_VERSION, Decoder, decode_program, decode_str};
pub use encode::{Encoder, encode_closure, encode_value};
pub use frame::Frame;
pub use objects::{ObjectConstructor, ObjectRegistry};
pub use opcode::{Inst, Op, Opcode};

#[cfg(test)]
mod vm_test;
