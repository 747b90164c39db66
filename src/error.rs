//! # Error Types
//!
//! One `thiserror` enum per pipeline layer (spec.md §7), matching the
//! teacher's per-subsystem error style (`storage::error::StorageError`,
//! `execution::limits::ResourceError`). Each layer returns its own error
//! to its immediate caller; [`EngineError`] is the union the facade
//! surfaces to external callers.

use thiserror::Error;

/// Lexical errors (spec.md §4.1, §7).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("{line}:{column}: invalid character '{ch}'")]
    InvalidCharacter { line: u32, column: u32, ch: char },

    #[error("{line}:{column}: unterminated string literal")]
    UnterminatedString { line: u32, column: u32 },
}

/// Syntactic errors (spec.md §4.2, §7).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{line}:{column}: unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        line: u32,
        column: u32,
        expected: String,
        got: String,
    },

    #[error("{line}:{column}: too many arguments (max {max})")]
    TooManyArguments { line: u32, column: u32, max: usize },

    #[error("{line}:{column}: rule head must be a predicate application")]
    NonPredicateHead { line: u32, column: u32 },

    #[error("{line}:{column}: expected a comparison operator")]
    MissingComparisonOperator { line: u32, column: u32 },

    #[error("{line}:{column}: unterminated string literal")]
    UnterminatedString { line: u32, column: u32 },

    #[error(transparent)]
    Lex(#[from] LexError),
}

/// Semantic (IR-building) errors (spec.md §4.3, §7).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("predicate '{name}' redeclared with arity {new_arity}, previously {old_arity}")]
    ArityMismatch {
        name: String,
        old_arity: usize,
        new_arity: usize,
    },

    #[error("argument {index} of '{name}' has type {expected:?}, found value of type {found:?}")]
    TypeMismatch {
        name: String,
        index: usize,
        expected: crate::ir::ArgType,
        found: crate::ir::ArgType,
    },

    #[error("rule for '{head}' is unsafe: variable '{variable}' has no positive occurrence")]
    UnsafeRule { head: String, variable: String },

    #[error("fact for unknown predicate '{name}'")]
    UnknownPredicateInFact { name: String },

    #[error("program is not stratifiable: negation cycle through '{predicate}'")]
    NegationCycle { predicate: String },

    #[error("too many {what} ({count}, max {max})")]
    OverLimit {
        what: &'static str,
        count: usize,
        max: usize,
    },
}

/// Compiled-binary (`.dlc`) codec errors (spec.md §4.4, §7).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bad magic bytes: {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("truncated payload: needed {needed} bytes, had {had}")]
    Truncated { needed: usize, had: usize },

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("length field out of range: {0}")]
    LengthOutOfRange(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Facade-level errors (spec.md §4.7, §7): the union callers actually see.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Ir(#[from] IrError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("fact for predicate {pred_id} has arity {given}, expected {expected}")]
    FactArityMismatch {
        pred_id: usize,
        given: usize,
        expected: usize,
    },

    #[error("fact argument {index} for predicate {pred_id} has the wrong type")]
    FactTypeMismatch { pred_id: usize, index: usize },

    #[error("unknown predicate id {0}")]
    UnknownPredicate(usize),

    #[error("{operation} failed: out of memory")]
    OutOfMemory { operation: &'static str },

    #[error("{operation} failed")]
    Internal { operation: &'static str },
}
