//! Token definitions for the ulang language.

use ulang_common::SourceLocation;
use std::fmt;

/// Tagged token kind. Identifiers, numbers and type keywords carry their
/// original source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    LCurly,
    RCurly,
    Comma,
    TypeKeyword,
    Identifier,
    Number,
    Plus,
    Minus,
    Mul,
    Div,
    Assign,
    Semicolon,
    Function,
    Return,
    EndOfFile,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub loc: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, loc: SourceLocation) -> Self {
        Self { kind, text: text.into(), loc }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind, self.text)
    }
}
