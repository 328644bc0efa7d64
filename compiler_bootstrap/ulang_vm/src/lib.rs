//! Register-based virtual machine: register file, heap allocator and the
//! straight-line dispatch loop that executes a `ulang_bytecode::Container`.

pub mod engine;
pub mod error;
pub mod heap;
pub mod registers;

pub use engine::*;
pub use error::*;
pub use heap::*;
pub use registers::*;
