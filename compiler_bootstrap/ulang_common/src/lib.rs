//! Shared utilities used across the ulang toolchain:
//! - source location tracking (`span`)
//! - diagnostic records and their human/machine rendering (`diagnostics`)

pub mod diagnostics;
pub mod span;

pub use diagnostics::*;
pub use span::*;
