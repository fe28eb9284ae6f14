//! Load error kinds.
//!
//! The loader never panics on bad input: errors are recorded while
//! scanning continues (one recorded error per resynchronization) and
//! surface as a `Value::Err` from `Loader::read`.
//!
//! Positions are deliberately not tracked: the incremental protocol
//! re-feeds arbitrary chunks, so absolute offsets would be misleading;
//! messages quote the offending text instead.

use thiserror::Error;

/// A problem found while loading source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// A closer with no open group.
    #[error("unexpected `{0}`")]
    UnexpectedCloser(&'static str),

    /// A closer that does not match the innermost open group.
    #[error("expected `{expected}`, found `{found}`")]
    MismatchedCloser {
        expected: &'static str,
        found: &'static str,
    },

    /// End of input inside a string or fence.
    #[error("unterminated string")]
    UnterminatedString,

    /// Any other scanner-reported problem.
    #[error("{0}")]
    Lex(String),
}
