//! Bytecode model, emitter, container (de)serializer and disassembler for
//! the ulang language.

pub mod container;
pub mod disasm;
pub mod emit;
pub mod error;
pub mod model;

pub use container::*;
pub use disasm::*;
pub use emit::*;
pub use error::*;
pub use model::*;
