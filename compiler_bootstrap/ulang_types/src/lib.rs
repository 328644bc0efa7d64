//! Fixed catalog of primitive data types for the ulang language.
//!
//! There is no user type declaration syntax and no type inference here —
//! just a stable, statically-allocated table of primitives that the lexer,
//! parser and bytecode container all refer to by `&'static` reference.

pub mod registry;

pub use registry::*;
