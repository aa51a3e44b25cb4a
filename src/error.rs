//! Error types for the bytecode writer and source rewriter.

use thiserror::Error;

/// Errors that can occur while obfuscating a chunk or rewriting source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShroudError {
    /// A quoted string literal contained an escape sequence that could not
    /// be decoded (e.g. a numeric escape greater than 255).
    #[error("malformed escape sequence at byte offset {pos}")]
    MalformedEscape { pos: usize },

    /// A quoted string literal ended in a lone, unescaped backslash.
    #[error("unescaped trailing backslash at byte offset {pos}")]
    TrailingBackslash { pos: usize },

    /// An instruction referenced an opcode outside the permutation's domain.
    #[error("opcode has no entry in the permutation table")]
    UnknownOpcode,

    /// An instruction operand did not fit in its field width.
    #[error("operand `{field}` = {value} does not fit its field width")]
    OperandOverflow { field: &'static str, value: i64 },

    /// A Rust `&str` passed to a Latin-1 encoding helper contained a
    /// character outside the Latin-1 byte range.
    #[error("character at byte offset {pos} is outside the Latin-1 range")]
    NonLatin1Char { pos: usize },

    /// A `ShroudConfig` could not be parsed from or serialized to TOML.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type Result<T> = std::result::Result<T, ShroudError>;
