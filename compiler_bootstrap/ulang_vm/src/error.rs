//! Fatal runtime error codes, raised once and halting the dispatch loop.

use thiserror::Error;
use ulang_bytecode::ContainerError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("OperandNotWriteable: operand of this type cannot be written to")]
    OperandNotWriteable,

    #[error("InvalidOperand: {0}")]
    InvalidOperand(String),

    #[error("DivisionByZero: division by zero at runtime")]
    DivisionByZero,

    #[error("OutOfMemory: heap allocation of {requested} bytes failed")]
    OutOfMemory { requested: u32 },

    #[error("HeapOob: heap offset {offset} is out of bounds (heap size {heap_size})")]
    HeapOob { offset: u32, heap_size: u32 },

    #[error("StackOverflow: stack pointer would move below the stack buffer base")]
    StackOverflow,

    #[error("StackUnderflow: pop from an empty stack")]
    StackUnderflow,

    #[error("NoFreeTemp: no free temporary register available")]
    NoFreeTemp,
}
