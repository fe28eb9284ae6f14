//! impi-par - Parser/Normalizer
//!
//! The parser refines a loaded token tree into its evaluable form. It
//! never changes the outer shape of the tree: a TOP stays a TOP, an
//! LST keeps its opener and closer. Two phases run over the contents
//! of every sequence:
//!
//! 1. **Strand formation.** Runs of adjacent INT/NUM scalars become an
//!    INTs or NUMs vector (any NUM in the run promotes the whole run);
//!    runs of adjacent backtick-quoted symbols become a SYMs vector. A
//!    run never crosses a separator, and a single scalar stays itself.
//!    The phase is idempotent: already-formed strands pass through.
//!
//! 2. **M-expression lowering.** Disabled by default and reserved:
//!    when enabled, top-level `a op b` with a known 2-arity `op`
//!    becomes the projection `op[a; b]`, and postfix `a F` with a
//!    1-arity `F` becomes `F[a]`. Sequences containing a comma
//!    separator are skipped. Verb arity comes from a host-supplied
//!    oracle, since words are late-bound and the parser has no
//!    dictionary of its own.

use impi_lex::value::{Lst, SepKind, SymKind, Value};
use impi_util::Symbol;

/// Parser configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Enable M-expression lowering on top-level sequences.
    pub m_expressions: bool,
}

/// Arity lookup for M-expression lowering. `None` means "not a verb".
pub type ArityOracle<'a> = &'a dyn Fn(Symbol) -> Option<i32>;

/// Tree refiner.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser {
    options: ParserOptions,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Refine a loaded tree without an arity oracle (M-expression
    /// lowering, if enabled, sees every word as a noun).
    pub fn parse(&self, value: Value) -> Value {
        self.parse_with(value, &|_| None)
    }

    /// Refine a loaded tree, consulting `oracle` for verb arities.
    pub fn parse_with(&self, value: Value, oracle: ArityOracle<'_>) -> Value {
        self.refine(value, oracle, true)
    }

    fn refine(&self, value: Value, oracle: ArityOracle<'_>, top_level: bool) -> Value {
        match value {
            Value::Top(items) => Value::Top(self.refine_items(items, oracle, top_level)),
            Value::Lst(lst) => {
                let Lst { open, close, items } = lst;
                let items = self.refine_items(items, oracle, false);
                Value::Lst(Lst { open, close, items })
            }
            other => other,
        }
    }

    fn refine_items(
        &self,
        items: Vec<Value>,
        oracle: ArityOracle<'_>,
        top_level: bool,
    ) -> Vec<Value> {
        let items: Vec<Value> = items
            .into_iter()
            .map(|item| match item {
                Value::Top(_) | Value::Lst(_) => self.refine(item, oracle, false),
                other => other,
            })
            .collect();

        let items = form_strands(items);

        if self.options.m_expressions && top_level {
            lower_m_expressions(items, oracle)
        } else {
            items
        }
    }
}

/// Phase 1: fold scalar runs into strand vectors.
pub fn form_strands(items: Vec<Value>) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len());
    let mut iter = items.into_iter().peekable();

    while let Some(item) = iter.next() {
        match item {
            Value::Int(_) | Value::Num(_) => {
                let mut run = vec![item];
                while matches!(iter.peek(), Some(Value::Int(_) | Value::Num(_))) {
                    run.push(iter.next().unwrap());
                }
                out.push(numeric_strand(run));
            }
            Value::Sym(first) if first.kind == SymKind::Bqt => {
                let mut run = vec![first];
                while matches!(iter.peek(), Some(Value::Sym(s)) if s.kind == SymKind::Bqt) {
                    let Some(Value::Sym(next)) = iter.next() else {
                        unreachable!()
                    };
                    run.push(next);
                }
                if run.len() == 1 {
                    out.push(Value::Sym(run[0]));
                } else {
                    out.push(Value::Syms(run));
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// A numeric run becomes INTs, or NUMs when any member is a NUM.
fn numeric_strand(run: Vec<Value>) -> Value {
    if run.len() == 1 {
        return run.into_iter().next().unwrap();
    }
    if run.iter().any(|v| matches!(v, Value::Num(_))) {
        Value::Nums(
            run.into_iter()
                .map(|v| match v {
                    Value::Int(n) => n as f64,
                    Value::Num(n) => n,
                    _ => unreachable!(),
                })
                .collect(),
        )
    } else {
        Value::Ints(
            run.into_iter()
                .map(|v| match v {
                    Value::Int(n) => n,
                    _ => unreachable!(),
                })
                .collect(),
        )
    }
}

/// Phase 2: rewrite infix and postfix verb applications into
/// projections. Applies only to sequences without a comma separator.
fn lower_m_expressions(items: Vec<Value>, oracle: ArityOracle<'_>) -> Vec<Value> {
    if items
        .iter()
        .any(|v| matches!(v, Value::Sep(kind) if kind.is_comma()))
    {
        return items;
    }

    let verb_arity = |item: &Value| -> Option<i32> {
        match item {
            Value::Sym(sym) if sym.kind == SymKind::Raw => oracle(sym.name),
            _ => None,
        }
    };

    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    let mut iter = items.into_iter().peekable();

    while let Some(item) = iter.next() {
        match verb_arity(&item) {
            Some(2)
                if out.last().is_some_and(|l| verb_arity(l).is_none() && !l.is_sep())
                    && iter.peek().is_some_and(|r| verb_arity(r).is_none() && !r.is_sep()) =>
            {
                let left = out.pop().unwrap();
                let right = iter.next().unwrap();
                out.push(projection(&item, vec![left, Value::Sep(SepKind::Semi), right]));
            }
            Some(1) if out.last().is_some_and(|l| verb_arity(l).is_none() && !l.is_sep()) => {
                let operand = out.pop().unwrap();
                out.push(projection(&item, vec![operand]));
            }
            _ => out.push(item),
        }
    }
    out
}

fn projection(verb: &Value, args: Vec<Value>) -> Value {
    let Value::Sym(sym) = verb else {
        unreachable!("projection target is always a raw symbol")
    };
    Value::Lst(Lst::new(&format!("{}[", sym.name.as_str()), ']', args))
}
