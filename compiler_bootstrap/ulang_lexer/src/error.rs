//! Lexer error types — every diagnostic code this phase can raise.

use thiserror::Error;
use ulang_common::SourceLocation;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("LexUnknownChar: unknown character '{ch}' at {loc}")]
    UnknownChar { ch: char, loc: SourceLocation },

    #[error("MissingCloseQuote: character literal starting at {loc} is missing its closing quote")]
    MissingCloseQuote { loc: SourceLocation },
}
