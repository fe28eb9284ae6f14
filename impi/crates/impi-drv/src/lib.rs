//! impi-drv - Interpreter Driver
//!
//! Hosts the pipeline: loader → parser → evaluator. A [`Session`] owns
//! one of each and exposes the two entry points the front ends use:
//!
//! - [`Session::feed_line`]: incremental, for the REPL. Lines
//!   accumulate in the loader until the input is balanced, so an open
//!   delimiter turns into a continuation prompt instead of an error.
//! - [`Session::eval_source`]: one-shot, for scripts and the worker.
//!
//! The REPL front end lives in [`repl`], the JSON-line worker protocol
//! in [`worker`]; the `impi` binary dispatches between them.

pub mod repl;
pub mod worker;

use thiserror::Error;

use impi_eval::{EvalError, Evaluator, FileAccess, InputProvider, OutputProvider};
use impi_lex::{Loader, Value};
use impi_par::Parser;

/// A failure surfaced to the host.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The loader rejected the source text.
    #[error("{0}")]
    Load(String),

    /// Evaluation failed.
    #[error(transparent)]
    Eval(#[from] EvalError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One interpreter instance: loader, parser, evaluator.
pub struct Session {
    loader: Loader,
    parser: Parser,
    evaluator: Evaluator,
}

impl Session {
    /// A session wired to stdin/stdout and the local filesystem.
    pub fn new() -> Self {
        Self::with_evaluator(Evaluator::new())
    }

    /// A session over host-supplied capabilities.
    pub fn with_providers(
        input: Box<dyn InputProvider>,
        output: Box<dyn OutputProvider>,
        files: Box<dyn FileAccess>,
    ) -> Self {
        Self::with_evaluator(Evaluator::with_providers(input, output, files))
    }

    fn with_evaluator(evaluator: Evaluator) -> Self {
        Self {
            loader: Loader::new(),
            parser: Parser::new(),
            evaluator,
        }
    }

    /// Evaluate a complete source text.
    pub async fn eval_source(&mut self, source: &str) -> SessionResult<Value> {
        let tree = Loader::load(source);
        self.eval_tree(tree).await
    }

    /// Feed one REPL line. `None` means the loader wants more input
    /// (unbalanced delimiters or an open string).
    pub async fn feed_line(&mut self, line: &str) -> Option<SessionResult<Value>> {
        self.loader.send(line);
        self.loader.send("\n");
        if !self.loader.ready() {
            return None;
        }
        let tree = self.loader.read();
        Some(self.eval_tree(tree).await)
    }

    async fn eval_tree(&mut self, tree: Value) -> SessionResult<Value> {
        match tree {
            Value::Err(message) => Err(SessionError::Load(message)),
            tree => {
                let parsed = self.parser.parse(tree);
                Ok(self.evaluator.eval(&parsed).await?)
            }
        }
    }

    /// True when no partial input is buffered.
    pub fn ready(&self) -> bool {
        self.loader.ready()
    }

    /// Discard buffered input and all user word definitions.
    pub fn reset(&mut self) {
        self.loader.reset();
        self.evaluator.reset_words();
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
