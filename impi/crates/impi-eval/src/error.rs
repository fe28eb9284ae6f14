//! Evaluation error kinds.
//!
//! The evaluator reports failures through a single `Result` discipline:
//! every error unwinds the current evaluation and reaches the host,
//! which prints the `Display` form after `Error: `. The word dictionary
//! is not rolled back on failure.

use thiserror::Error;

/// A failure during evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A RAW symbol with no binding.
    #[error("undefined word: {0}")]
    Lookup(String),

    /// An operand of the wrong kind.
    #[error("{0}")]
    Type(String),

    /// Wrong number of arguments (projection overflow, composition
    /// mismatch).
    #[error("{0}")]
    Arity(String),

    /// A capability reported an I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised by a built-in on behalf of user code.
    #[error("{0}")]
    User(String),

    /// A nested load failed (the `load` word).
    #[error("load error: {0}")]
    Load(String),
}

pub type EvalResult<T> = Result<T, EvalError>;
