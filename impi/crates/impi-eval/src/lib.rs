//! impi-eval - Evaluator
//!
//! A stack-based tree walker driven by runtime parts of speech. The
//! scanner walks each sequence left to right, resolving RAW symbols
//! late (at scan time, against the word dictionary), applying verbs to
//! the nouns that follow them, chaining infix applications strictly
//! left to right, and building partial applications whenever a verb
//! runs out of arguments.
//!
//! Evaluation is single-threaded and cooperative: every function here
//! is `async`, and the only suspension points are the I/O words
//! (`rd`, `wr`, `rln`, `echo`), which await their capability futures.
//! Recursion (nested groups, function application) uses the Rust call
//! stack with boxed futures.
//!
//! ```
//! use impi_eval::Evaluator;
//! use impi_lex::Loader;
//! use impi_par::Parser;
//!
//! # async fn demo() -> impi_eval::EvalResult<()> {
//! let mut evaluator = Evaluator::new();
//! let program = Parser::new().parse(Loader::load("x: 1 2 3  +/ x"));
//! let result = evaluator.eval(&program).await?;
//! assert_eq!(result, impi_lex::Value::Int(6));
//! # Ok(())
//! # }
//! ```

mod apply;
pub mod caps;
mod error;
mod show;
mod specials;
mod words;

pub use caps::{
    native_path, BufferOutput, FileAccess, InputProvider, MemFiles, NativeFiles, OutputProvider,
    ScriptedInput, StdInput, StdOutput,
};
pub use error::{EvalError, EvalResult};
pub use show::{display_text, show, xmls};

use async_recursion::async_recursion;
use tracing::trace;

use impi_lex::value::{HostFn, JsFn, Lst, Part, Sym, SymKind, Value};
use impi_util::{FxHashMap, Symbol};

/// Cursor over the sequence currently being scanned.
pub(crate) struct Scan<'a> {
    items: &'a [Value],
    pos: usize,
}

impl<'a> Scan<'a> {
    fn new(items: &'a [Value]) -> Self {
        Self { items, pos: 0 }
    }

    fn next(&mut self) -> Option<&'a Value> {
        let item = self.items.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }

    fn peek(&self) -> Option<&'a Value> {
        self.items.get(self.pos)
    }
}

/// How a sequence reports its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeqMode {
    /// Top-level programs and function bodies: the last non-NIL value.
    Program,
    /// Parentheses: the final value; an empty sequence is an empty
    /// integer strand.
    Last,
    /// Square brackets: an LST of everything emitted.
    List,
}

/// The evaluator: a word dictionary plus the host capabilities.
///
/// Separate evaluators are fully independent; the only process-wide
/// state is the append-only symbol table.
pub struct Evaluator {
    pub(crate) words: FxHashMap<Symbol, Value>,
    pub(crate) input: Box<dyn InputProvider>,
    pub(crate) output: Box<dyn OutputProvider>,
    pub(crate) files: Box<dyn FileAccess>,
}

impl Evaluator {
    /// An evaluator wired to stdin/stdout and the local filesystem.
    pub fn new() -> Self {
        Self::with_providers(
            Box::new(StdInput),
            Box::new(StdOutput),
            Box::new(NativeFiles),
        )
    }

    /// An evaluator with host-supplied capabilities.
    pub fn with_providers(
        input: Box<dyn InputProvider>,
        output: Box<dyn OutputProvider>,
        files: Box<dyn FileAccess>,
    ) -> Self {
        let mut words = FxHashMap::default();
        words::install(&mut words);
        Self {
            words,
            input,
            output,
            files,
        }
    }

    /// Evaluate a value (usually a parsed TOP).
    pub async fn eval(&mut self, value: &Value) -> EvalResult<Value> {
        match value {
            Value::Top(items) => self.eval_seq(items, SeqMode::Program).await,
            other => {
                self.eval_seq(std::slice::from_ref(other), SeqMode::Program)
                    .await
            }
        }
    }

    /// The word dictionary.
    pub fn words(&self) -> &FxHashMap<Symbol, Value> {
        &self.words
    }

    /// Define or replace a word binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.words.insert(Symbol::intern(name), value);
    }

    /// Look up a word binding.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.words.get(&Symbol::intern(name))
    }

    /// Drop every user definition and reinstall the built-ins.
    pub fn reset_words(&mut self) {
        self.words.clear();
        words::install(&mut self.words);
    }

    // ------------------------------------------------------------------
    // Core scanning loop
    // ------------------------------------------------------------------

    /// Evaluate a sequence of items under the given mode.
    #[async_recursion(?Send)]
    pub(crate) async fn eval_seq(&mut self, items: &[Value], mode: SeqMode) -> EvalResult<Value> {
        let mut scan = Scan::new(items);
        let mut emitted: Vec<Value> = Vec::new();

        loop {
            // Separators are skipped, except that `, verb` pops the
            // previously emitted value and pipes it through the verb.
            while let Some(Value::Sep(kind)) = scan.peek() {
                let comma = kind.is_comma();
                scan.next();
                if comma && !emitted.is_empty() {
                    let (op, part) = self.peek_item(&scan)?;
                    if part == Part::Verb {
                        self.next_item(&mut scan)?;
                        let prior = emitted.pop().expect("emitted checked non-empty");
                        let mut args = vec![prior];
                        if op.arity() == Some(2) {
                            if let Some(right) = self.next_noun(&mut scan).await? {
                                args.push(right);
                            }
                        }
                        let result = self.apply(op, args).await?;
                        emitted.push(result);
                    }
                }
            }

            let (item, part) = self.next_item(&mut scan)?;
            match part {
                Part::End => break,
                Part::Verb => {
                    let verb = self.modify_verb(item, &mut scan)?;
                    let result = self.apply_or_partial(verb, &mut scan).await?;
                    let result = self.modify_noun(result, &mut scan).await?;
                    emitted.push(result);
                }
                Part::Noun => {
                    let value = self.eval_noun(&item).await?;
                    let result = if value.part() == Part::Verb {
                        self.apply_or_partial(value, &mut scan).await?
                    } else {
                        self.modify_noun(value, &mut scan).await?
                    };
                    emitted.push(result);
                }
                Part::Quote
                | Part::Message
                | Part::Adverb
                | Part::Preposition
                | Part::Conjunction => emitted.push(item),
                Part::Getter => {
                    let value = self.read_variable(&item)?;
                    emitted.push(value);
                }
                Part::Setter => {
                    let Value::Sym(sym) = &item else {
                        unreachable!("setter is always a symbol")
                    };
                    let value = self.do_assign(*sym, &mut scan).await?;
                    emitted.push(value);
                }
            }
        }

        Ok(match mode {
            SeqMode::Program => emitted
                .into_iter()
                .rev()
                .find(|v| !v.is_nil())
                .unwrap_or(Value::Nil),
            SeqMode::Last => emitted.pop().unwrap_or(Value::Ints(Vec::new())),
            SeqMode::List => Value::Lst(Lst::new("[", ']', emitted)),
        })
    }

    /// Read the next item, resolving RAW symbols against the word
    /// dictionary and assigning the runtime part of speech.
    fn next_item(&self, scan: &mut Scan<'_>) -> EvalResult<(Value, Part)> {
        match scan.next() {
            None => Ok((Value::End, Part::End)),
            Some(item) => self.resolve(item),
        }
    }

    /// `next_item` with the position restored.
    fn peek_item(&self, scan: &Scan<'_>) -> EvalResult<(Value, Part)> {
        match scan.peek() {
            None => Ok((Value::End, Part::End)),
            Some(item) => self.resolve(item),
        }
    }

    /// Late binding. A RAW name ending in `/` or `\` over a 2-arity
    /// function synthesizes a fold/scan verb (never cached); any other
    /// RAW name must be in the dictionary.
    fn resolve(&self, item: &Value) -> EvalResult<(Value, Part)> {
        if let Value::Sym(sym) = item {
            if sym.kind == SymKind::Raw {
                let name = sym.name.as_str();

                if let Some(base) = name.strip_suffix('/') {
                    if !base.is_empty() {
                        if let Some(op) = self.lookup_two_arity(base) {
                            let jsf = JsFn {
                                host: HostFn::Fold(Box::new(op)),
                                arity: 1,
                                captured: Vec::new(),
                                quoted: false,
                            };
                            return Ok((Value::Jsf(jsf), Part::Verb));
                        }
                    }
                }
                if let Some(base) = name.strip_suffix('\\') {
                    if !base.is_empty() {
                        if let Some(op) = self.lookup_two_arity(base) {
                            let jsf = JsFn {
                                host: HostFn::Scan(Box::new(op)),
                                arity: 1,
                                captured: Vec::new(),
                                quoted: false,
                            };
                            return Ok((Value::Jsf(jsf), Part::Verb));
                        }
                    }
                }

                return match self.words.get(&sym.name) {
                    Some(value) => Ok((value.clone(), value.part())),
                    None => Err(EvalError::Lookup(name.to_string())),
                };
            }
        }
        Ok((item.clone(), item.part()))
    }

    fn lookup_two_arity(&self, base: &str) -> Option<Value> {
        let value = self.words.get(&Symbol::intern(base))?;
        (value.arity() == Some(2)).then(|| value.clone())
    }

    fn read_variable(&self, item: &Value) -> EvalResult<Value> {
        let Value::Sym(sym) = item else {
            unreachable!("getter is always a symbol")
        };
        self.words
            .get(&sym.name)
            .cloned()
            .ok_or_else(|| EvalError::Lookup(sym.name.as_str().to_string()))
    }

    /// One fully evaluated value: `next_noun_item` plus infix chaining.
    #[async_recursion(?Send)]
    pub(crate) async fn next_noun(&mut self, scan: &mut Scan<'_>) -> EvalResult<Option<Value>> {
        match self.next_noun_item(scan).await? {
            None => Ok(None),
            Some(value) => Ok(Some(self.modify_noun(value, scan).await?)),
        }
    }

    /// One value without infix chaining, for infix right operands (this
    /// is what makes chains strictly left-associative). Never consumes
    /// a separator.
    #[async_recursion(?Send)]
    async fn next_noun_item(&mut self, scan: &mut Scan<'_>) -> EvalResult<Option<Value>> {
        let (item, part) = self.peek_item(scan)?;
        if part == Part::End {
            return Ok(None);
        }
        scan.next();

        Ok(Some(match part {
            Part::Verb => {
                let verb = self.modify_verb(item, scan)?;
                self.apply_or_partial(verb, scan).await?
            }
            Part::Noun => {
                let value = self.eval_noun(&item).await?;
                if value.part() == Part::Verb {
                    self.apply_or_partial(value, scan).await?
                } else {
                    value
                }
            }
            Part::Quote
            | Part::Message
            | Part::Adverb
            | Part::Preposition
            | Part::Conjunction => item,
            Part::Getter => self.read_variable(&item)?,
            Part::Setter => {
                let Value::Sym(sym) = &item else {
                    unreachable!("setter is always a symbol")
                };
                self.do_assign(*sym, scan).await?
            }
            Part::End => unreachable!("end handled above"),
        }))
    }

    /// Post-noun behaviors, repeated while the next item matches:
    /// dictionary lookup by quoted key, and 2-arity infix chaining.
    /// Running out of input mid-chain leaves a partial with the left
    /// operand captured.
    #[async_recursion(?Send)]
    pub(crate) async fn modify_noun(
        &mut self,
        value: Value,
        scan: &mut Scan<'_>,
    ) -> EvalResult<Value> {
        let mut value = value;
        loop {
            if let Value::Dct(map) = &value {
                match scan.peek() {
                    Some(Value::Sym(key)) if key.kind == SymKind::Bqt => {
                        let picked = Self::dct_lookup(map, key)?;
                        scan.next();
                        value = picked;
                        continue;
                    }
                    Some(Value::Syms(keys)) => {
                        let picked: Vec<Value> = keys
                            .iter()
                            .map(|key| Self::dct_lookup(map, key))
                            .collect::<EvalResult<_>>()?;
                        scan.next();
                        value = Value::Lst(Lst::new("[", ']', picked));
                        continue;
                    }
                    _ => {}
                }
            }

            let (op, part) = self.peek_item(scan)?;
            if part == Part::Verb && op.arity() == Some(2) {
                self.next_item(scan)?;
                value = match self.next_noun_item(scan).await? {
                    Some(right) => self.apply(op, vec![value, right]).await?,
                    None => self.apply(op, vec![value]).await?,
                };
                continue;
            }
            break;
        }
        Ok(value)
    }

    /// Verb modifiers: composition of adjacent 1-arity verbs (adverbs,
    /// prepositions, and conjunctions are reserved). A composed verb
    /// inherits the inner verb's quoting, so special forms keep
    /// receiving their arguments unevaluated.
    fn modify_verb(&self, verb: Value, scan: &mut Scan<'_>) -> EvalResult<Value> {
        let mut verb = verb;
        loop {
            let (next, part) = self.peek_item(scan)?;
            if part != Part::Verb {
                break;
            }
            if verb.arity() != Some(1) || next.arity() != Some(1) {
                return Err(EvalError::Arity("composition arity mismatch".to_string()));
            }
            scan.next();
            let quoted = matches!(&next, Value::Jsf(f) if f.quoted);
            verb = Value::Jsf(JsFn {
                host: HostFn::Compose(Box::new(verb), Box::new(next)),
                arity: 1,
                captured: Vec::new(),
                quoted,
            });
        }
        Ok(verb)
    }

    /// Collect up to the verb's arity and apply; fewer arguments build
    /// a partial. Quoted special forms receive their arguments
    /// unevaluated.
    #[async_recursion(?Send)]
    pub(crate) async fn apply_or_partial(
        &mut self,
        verb: Value,
        scan: &mut Scan<'_>,
    ) -> EvalResult<Value> {
        let quoted = matches!(&verb, Value::Jsf(f) if f.quoted);
        let arity = verb.arity().unwrap_or(0);
        let mut args = Vec::new();

        if arity < 0 {
            while let Some(arg) = self.next_noun(scan).await? {
                args.push(arg);
            }
        } else {
            for _ in 0..arity {
                let arg = if quoted {
                    self.next_raw_arg(scan)
                } else {
                    self.next_noun(scan).await?
                };
                match arg {
                    Some(value) => args.push(value),
                    None => break,
                }
            }
        }
        self.apply(verb, args).await
    }

    /// Unevaluated argument for quoted special forms.
    fn next_raw_arg(&self, scan: &mut Scan<'_>) -> Option<Value> {
        match scan.peek() {
            None | Some(Value::Sep(_)) => None,
            Some(item) => {
                let item = item.clone();
                scan.next();
                Some(item)
            }
        }
    }

    /// Assignment. Right-associative: a chained set-word assigns the
    /// inner value outward.
    #[async_recursion(?Send)]
    pub(crate) async fn do_assign(&mut self, target: Sym, scan: &mut Scan<'_>) -> EvalResult<Value> {
        let (item, part) = self.next_item(scan)?;
        let value = match part {
            Part::End => {
                return Err(EvalError::Type(
                    "invalid expression after set-word".to_string(),
                ))
            }
            Part::Setter => {
                let Value::Sym(inner) = &item else {
                    unreachable!("setter is always a symbol")
                };
                self.do_assign(*inner, scan).await?
            }
            Part::Getter => self.read_variable(&item)?,
            Part::Noun => {
                let value = self.eval_noun(&item).await?;
                self.modify_noun(value, scan).await?
            }
            Part::Verb => {
                let verb = self.modify_verb(item, scan)?;
                self.apply_or_partial(verb, scan).await?
            }
            Part::Quote
            | Part::Message
            | Part::Adverb
            | Part::Preposition
            | Part::Conjunction => item,
        };
        trace!(name = target.name.as_str(), "assign");
        self.words.insert(target.name, value.clone());
        Ok(value)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
