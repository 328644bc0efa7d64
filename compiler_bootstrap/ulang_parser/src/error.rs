//! Every compile-time diagnostic code, modeled as a sum type so rendering
//! is a total function over it (see `ulang_common::Diagnostic`).

use std::fmt;
use ulang_common::{Diagnostic, Severity, SourceLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagCode {
    BuiltinRedecl,
    RedeclInScope,
    VarUndefined,
    UnexpectedToken,
    ExpectedPrimary,
    ExpectedExpr,
    MissingCloseQuote,
    TypeDetermineFail,
    TypesSignDiff,
    TypesSizeDiff,
    FnNoBody,
    FnNotFn,
    FnRedefine,
    FnNoRet,
    FnRetVoid,
    InvalidRet,
    UnexpectedReturn,
    DivisionZero,
}

impl DiagCode {
    /// Only `(W)`-marked codes are warnings; everything else aborts
    /// compilation.
    pub fn severity(self) -> Severity {
        use DiagCode::*;
        match self {
            TypesSignDiff | TypesSizeDiff | FnNoBody | DivisionZero => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        use DiagCode::*;
        match self {
            BuiltinRedecl => "BuiltinRedecl",
            RedeclInScope => "RedeclInScope",
            VarUndefined => "VarUndefined",
            UnexpectedToken => "UnexpectedToken",
            ExpectedPrimary => "ExpectedPrimary",
            ExpectedExpr => "ExpectedExpr",
            MissingCloseQuote => "MissingCloseQuote",
            TypeDetermineFail => "TypeDetermineFail",
            TypesSignDiff => "TypesSignDiff",
            TypesSizeDiff => "TypesSizeDiff",
            FnNoBody => "FnNoBody",
            FnNotFn => "FnNotFn",
            FnRedefine => "FnRedefine",
            FnNoRet => "FnNoRet",
            FnRetVoid => "FnRetVoid",
            InvalidRet => "InvalidRet",
            UnexpectedReturn => "UnexpectedReturn",
            DivisionZero => "DivisionZero",
        }
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn diag(code: DiagCode, message: impl Into<String>, loc: SourceLocation) -> Diagnostic {
    Diagnostic { severity: code.severity(), code: code.as_str().to_string(), message: message.into(), loc }
}

/// A fatal compile-time error. Carries the diagnostic it renders as.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CompileError(pub Diagnostic);

impl CompileError {
    pub fn new(code: DiagCode, message: impl Into<String>, loc: SourceLocation) -> Self {
        Self(diag(code, message, loc))
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
