//! Group evaluation: parentheses, lists, function literals,
//! quasiquote, quoted lists, dictionary literals, and projection.

use async_recursion::async_recursion;
use indexmap::IndexMap;

use impi_lex::value::{IfnDef, Lst, Sym, SymKind, Value};
use impi_util::Symbol;

use crate::error::{EvalError, EvalResult};
use crate::{Evaluator, SeqMode};

impl Evaluator {
    /// Evaluate a noun. Scalars, strands, and non-RAW symbols are
    /// themselves; groups dispatch on their opener.
    #[async_recursion(?Send)]
    pub(crate) async fn eval_noun(&mut self, item: &Value) -> EvalResult<Value> {
        match item {
            Value::Lst(lst) => self.eval_group(lst).await,
            Value::Top(items) => self.eval_seq(items, SeqMode::Program).await,
            other => Ok(other.clone()),
        }
    }

    /// Opener dispatch:
    ///
    /// | opener   | meaning |
    /// |----------|---------|
    /// | `(`      | sequence, last value |
    /// | `[`      | sequence, collected into an LST |
    /// | `{`      | function literal |
    /// | `` `[ `` | quasiquote |
    /// | `'[`     | quoted list (contents untouched) |
    /// | `:[`     | dictionary literal |
    /// | `name[`  | projection |
    #[async_recursion(?Send)]
    async fn eval_group(&mut self, lst: &Lst) -> EvalResult<Value> {
        let prefix = lst.prefix();

        if prefix.is_empty() {
            return match lst.bracket() {
                '(' => self.eval_seq(&lst.items, SeqMode::Last).await,
                '[' => self.eval_seq(&lst.items, SeqMode::List).await,
                '{' => Ok(Value::Ifn(make_ifn(&lst.items))),
                other => Err(EvalError::Type(format!(
                    "unknown group delimiter `{}`",
                    other
                ))),
            };
        }
        if prefix.starts_with('`') {
            return self.quasiquote(lst);
        }
        if let Some(stripped) = prefix.strip_prefix('\'') {
            // Drop the quote; contents stay as loaded.
            let open = format!("{}{}", stripped, lst.bracket());
            return Ok(Value::Lst(Lst::new(&open, lst.close, lst.items.clone())));
        }
        if prefix == ":" {
            return self.dict_literal(&lst.items).await;
        }
        if lst.bracket() == '{' {
            return Err(EvalError::Type(format!(
                "`{}{{` has no applicable meaning",
                prefix
            )));
        }
        self.projection(prefix, &lst.items).await
    }

    /// Quasiquote: strip the leading backtick from openers, splice
    /// unquotes, then re-form strands so spliced scalars join their
    /// neighbors.
    pub(crate) fn quasiquote(&self, lst: &Lst) -> EvalResult<Value> {
        let open = lst.open.as_str();
        let open = open.strip_prefix('`').unwrap_or(open);
        let mut items = Vec::with_capacity(lst.items.len());
        for item in &lst.items {
            items.push(self.quasi_walk(item)?);
        }
        let items = impi_par::form_strands(items);
        Ok(Value::Lst(Lst::new(open, lst.close, items)))
    }

    fn quasi_walk(&self, value: &Value) -> EvalResult<Value> {
        match value {
            Value::Sym(sym) if sym.kind == SymKind::Unq => {
                let resolved = self
                    .words
                    .get(&sym.name)
                    .cloned()
                    .ok_or_else(|| EvalError::Lookup(sym.name.as_str().to_string()))?;
                Ok(match resolved {
                    // A quoted symbol loses its quote when spliced.
                    Value::Sym(inner) if matches!(inner.kind, SymKind::Lit | SymKind::Bqt) => {
                        Value::Sym(Sym {
                            name: inner.name,
                            kind: SymKind::Raw,
                        })
                    }
                    other => other,
                })
            }
            Value::Lst(lst) => {
                let Value::Lst(rewritten) = self.quasiquote(lst)? else {
                    unreachable!("quasiquote returns an LST")
                };
                Ok(Value::Lst(rewritten))
            }
            other => Ok(other.clone()),
        }
    }

    /// `:[`k v`;` …`]`: each non-comma-separated segment is a backtick
    /// key followed by a sequence whose last value is stored.
    async fn dict_literal(&mut self, items: &[Value]) -> EvalResult<Value> {
        let mut map = IndexMap::new();
        for segment in split_segments(items) {
            if segment.is_empty() {
                continue;
            }
            let Value::Sym(key) = &segment[0] else {
                return Err(EvalError::Type(
                    "dictionary key must be a backtick symbol".to_string(),
                ));
            };
            if key.kind != SymKind::Bqt {
                return Err(EvalError::Type(
                    "dictionary key must be a backtick symbol".to_string(),
                ));
            }
            let value = if segment.len() == 1 {
                Value::Nil
            } else {
                self.eval_seq(&segment[1..], SeqMode::Last).await?
            };
            map.insert(key.name, value);
        }
        Ok(Value::Dct(map))
    }

    /// Projection `name[a; b; …]`: argument groups split on non-comma
    /// separators. Dictionaries index by quoted keys instead of
    /// applying; functions check arity exactly (variadic is -1), with
    /// fewer arguments building a partial.
    async fn projection(&mut self, name: &str, items: &[Value]) -> EvalResult<Value> {
        let (target, _) = self.resolve(&Value::Sym(Sym::raw(name)))?;

        if let Value::Dct(map) = &target {
            let mut picked = Vec::new();
            for segment in split_segments(items) {
                if segment.is_empty() {
                    continue;
                }
                let key = self.eval_seq(segment, SeqMode::Last).await?;
                match key {
                    Value::Sym(sym) if matches!(sym.kind, SymKind::Lit | SymKind::Bqt) => {
                        picked.push(Self::dct_lookup(map, &sym)?);
                    }
                    Value::Syms(keys) => {
                        for key in &keys {
                            picked.push(Self::dct_lookup(map, key)?);
                        }
                    }
                    other => {
                        return Err(EvalError::Type(format!(
                            "dictionary index must be a quoted symbol, got {}",
                            other.kind_name()
                        )))
                    }
                }
            }
            return Ok(if picked.len() == 1 {
                picked.pop().expect("length checked")
            } else {
                Value::Lst(Lst::new("[", ']', picked))
            });
        }

        if !matches!(target, Value::Jsf(_) | Value::Ifn(_)) {
            return Err(EvalError::Type(format!(
                "cannot apply {} `{}`",
                target.kind_name(),
                name
            )));
        }

        let quoted = matches!(&target, Value::Jsf(f) if f.quoted);
        let mut args = Vec::new();
        for segment in split_segments(items) {
            if segment.is_empty() {
                continue;
            }
            if quoted {
                // Special forms receive the group as an unevaluated
                // thunk: the bare item, or a TOP wrapping of the group.
                args.push(if segment.len() == 1 {
                    segment[0].clone()
                } else {
                    Value::Top(segment.to_vec())
                });
            } else {
                args.push(self.eval_seq(segment, SeqMode::Last).await?);
            }
        }

        let arity = target.arity().unwrap_or(0);
        if arity >= 0 && (args.len() as i32) > arity {
            return Err(EvalError::Arity(format!(
                "too many arguments for `{}`: expected {}, got {}",
                name,
                arity,
                args.len()
            )));
        }
        self.apply(target, args).await
    }

    /// Evaluate a special-form thunk on demand. Plain groups and TOP
    /// wrappings run as programs; anything else evaluates normally.
    pub(crate) async fn eval_thunk(&mut self, thunk: &Value) -> EvalResult<Value> {
        match thunk {
            Value::Top(items) => self.eval_seq(items, SeqMode::Program).await,
            Value::Lst(lst) if lst.prefix().is_empty() && matches!(lst.bracket(), '[' | '(') => {
                self.eval_seq(&lst.items, SeqMode::Program).await
            }
            other => self.eval(other).await,
        }
    }

    pub(crate) fn dct_lookup(map: &IndexMap<Symbol, Value>, key: &Sym) -> EvalResult<Value> {
        map.get(&key.name).cloned().ok_or_else(|| {
            EvalError::Type(format!("key not found: `{}", key.name.as_str()))
        })
    }
}

/// Split a group's items into segments at non-comma separators.
pub(crate) fn split_segments(items: &[Value]) -> Vec<&[Value]> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, item) in items.iter().enumerate() {
        if let Value::Sep(kind) = item {
            if !kind.is_comma() {
                out.push(&items[start..i]);
                start = i + 1;
            }
        }
    }
    out.push(&items[start..]);
    out
}

/// Build a function literal. Arity is the highest-ranked free
/// reference to `x` < `y` < `z` (RAW or GET), not descending into
/// nested `{…}` literals.
pub(crate) fn make_ifn(body: &[Value]) -> IfnDef {
    fn rank(items: &[Value]) -> u8 {
        let mut best = 0;
        for item in items {
            match item {
                Value::Sym(sym) if matches!(sym.kind, SymKind::Raw | SymKind::Get) => {
                    let r = match sym.name.as_str() {
                        "x" => 1,
                        "y" => 2,
                        "z" => 3,
                        _ => 0,
                    };
                    best = best.max(r);
                }
                Value::Lst(lst) => {
                    if lst.bracket() == '{' {
                        continue;
                    }
                    best = best.max(rank(&lst.items));
                }
                Value::Top(items) => best = best.max(rank(items)),
                _ => {}
            }
        }
        best
    }

    IfnDef {
        body: body.to_vec(),
        arity: rank(body),
    }
}
