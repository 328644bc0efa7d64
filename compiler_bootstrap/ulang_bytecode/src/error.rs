//! Fatal errors raised while emitting instructions or (de)serializing the
//! bytecode container.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// All four `TMP0..TMP3` slots are busy when `alloc_tmp()` is called.
    #[error("NoFreeTemp: no free temporary register available")]
    NoFreeTemp,
    /// A `CALL` targets a function whose `entry_ip` was never patched —
    /// a builtin (`uPutChar`/`uGetChar`) or a body-less declaration.
    #[error("CallUnresolvedEntry: '{0}' has no callable body")]
    CallUnresolvedEntry(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("BytecodeInvalidHeader: {0}")]
    InvalidHeader(String),
    #[error("BytecodeTruncated: {0}")]
    Truncated(String),
    #[error("BytecodeChecksum: stored checksum does not match the computed one")]
    Checksum,
}
