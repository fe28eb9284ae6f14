//! Function application: primitives, partials, composition, function
//! literals, and fold/scan reduction.

use async_recursion::async_recursion;

use impi_lex::value::{HostFn, IfnDef, JsFn, Lst, Value};
use impi_util::Symbol;

use crate::error::{EvalError, EvalResult};
use crate::{Evaluator, SeqMode};

impl Evaluator {
    /// Apply a callable to already-evaluated arguments.
    ///
    /// Fewer arguments than the remaining arity produce a partial that
    /// captures them; the capture invariant is
    /// `captured.len() + arity == original arity`, and completing the
    /// partial calls the underlying function with `captured ++ rest`.
    #[async_recursion(?Send)]
    pub(crate) async fn apply(&mut self, callable: Value, args: Vec<Value>) -> EvalResult<Value> {
        match callable {
            Value::Jsf(f) => self.apply_jsf(f, args).await,
            Value::Ifn(f) => self.apply_ifn(f, args).await,
            other => Err(EvalError::Type(format!(
                "cannot apply {}",
                other.kind_name()
            ))),
        }
    }

    #[async_recursion(?Send)]
    async fn apply_jsf(&mut self, f: JsFn, args: Vec<Value>) -> EvalResult<Value> {
        let JsFn {
            host,
            arity,
            captured,
            quoted,
        } = f;

        if arity >= 0 {
            let given = args.len() as i32;
            if given < arity {
                let mut captured = captured;
                captured.extend(args);
                return Ok(Value::Jsf(JsFn {
                    host,
                    arity: arity - given,
                    captured,
                    quoted,
                }));
            }
            if given > arity {
                return Err(EvalError::Arity(format!(
                    "too many arguments: expected {}, got {}",
                    arity, given
                )));
            }
        }

        let mut full = captured;
        full.extend(args);

        match host {
            HostFn::Prim(name) => self.apply_prim(name, full).await,
            HostFn::Fold(op) => {
                let operand = single(full)?;
                self.fold(*op, operand).await
            }
            HostFn::Scan(op) => {
                let operand = single(full)?;
                self.scan_op(*op, operand).await
            }
            HostFn::Compose(outer, inner) => {
                let inner_result = self.apply(*inner, full).await?;
                self.apply(*outer, vec![inner_result]).await
            }
            HostFn::Closure(callable) => self.apply(*callable, full).await,
        }
    }

    /// Function literal application: dynamic save/rebind/restore of
    /// `x`, `y`, `z`. Bindings are restored (or removed) even when the
    /// body fails.
    #[async_recursion(?Send)]
    async fn apply_ifn(&mut self, f: IfnDef, args: Vec<Value>) -> EvalResult<Value> {
        let arity = f.arity as usize;

        if args.len() < arity {
            let remaining = (arity - args.len()) as i32;
            return Ok(Value::Jsf(JsFn {
                host: HostFn::Closure(Box::new(Value::Ifn(f))),
                arity: remaining,
                captured: args,
                quoted: false,
            }));
        }
        if args.len() > arity {
            return Err(EvalError::Arity(format!(
                "too many arguments: expected {}, got {}",
                arity,
                args.len()
            )));
        }

        const PARAMS: [&str; 3] = ["x", "y", "z"];
        let mut saved: Vec<(Symbol, Option<Value>)> = Vec::with_capacity(arity);
        for (param, arg) in PARAMS.iter().zip(args) {
            let name = Symbol::intern(param);
            saved.push((name, self.words.insert(name, arg)));
        }

        let result = self.eval_seq(&f.body, SeqMode::Program).await;

        for (name, previous) in saved.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.words.insert(name, value);
                }
                None => {
                    self.words.remove(&name);
                }
            }
        }

        result
    }

    /// `op/ x`: scalar passes through, an empty strand yields the
    /// identity (or fails when the verb has none), anything else is a
    /// left-to-right reduction.
    #[async_recursion(?Send)]
    pub(crate) async fn fold(&mut self, op: Value, operand: Value) -> EvalResult<Value> {
        match operand {
            Value::Int(_) | Value::Num(_) => Ok(operand),
            Value::Ints(v) => {
                if v.is_empty() {
                    return fold_identity(&op);
                }
                let mut acc = Value::Int(v[0]);
                for n in &v[1..] {
                    acc = self.apply(op.clone(), vec![acc, Value::Int(*n)]).await?;
                }
                Ok(acc)
            }
            Value::Nums(v) => {
                if v.is_empty() {
                    return fold_identity(&op);
                }
                let mut acc = Value::Num(v[0]);
                for n in &v[1..] {
                    acc = self.apply(op.clone(), vec![acc, Value::Num(*n)]).await?;
                }
                Ok(acc)
            }
            Value::Lst(lst) => {
                let items: Vec<Value> =
                    lst.items.iter().filter(|i| !i.is_sep()).cloned().collect();
                if items.is_empty() {
                    return fold_identity(&op);
                }
                let mut iter = items.into_iter();
                let mut acc = iter.next().expect("checked non-empty");
                for item in iter {
                    acc = self.apply(op.clone(), vec![acc, item]).await?;
                }
                Ok(acc)
            }
            other => Err(EvalError::Type(format!(
                "cannot fold over {}",
                other.kind_name()
            ))),
        }
    }

    /// `op\ x`: like fold, emitting every intermediate result.
    #[async_recursion(?Send)]
    pub(crate) async fn scan_op(&mut self, op: Value, operand: Value) -> EvalResult<Value> {
        match operand {
            Value::Int(_) | Value::Num(_) => Ok(operand),
            Value::Ints(v) => {
                if v.is_empty() {
                    return Ok(Value::Ints(v));
                }
                let mut acc = Value::Int(v[0]);
                let mut out = vec![acc.clone()];
                for n in &v[1..] {
                    acc = self.apply(op.clone(), vec![acc, Value::Int(*n)]).await?;
                    out.push(acc.clone());
                }
                Ok(numeric_vector(out))
            }
            Value::Nums(v) => {
                if v.is_empty() {
                    return Ok(Value::Nums(v));
                }
                let mut acc = Value::Num(v[0]);
                let mut out = vec![acc.clone()];
                for n in &v[1..] {
                    acc = self.apply(op.clone(), vec![acc, Value::Num(*n)]).await?;
                    out.push(acc.clone());
                }
                Ok(numeric_vector(out))
            }
            Value::Lst(lst) => {
                let items: Vec<Value> =
                    lst.items.iter().filter(|i| !i.is_sep()).cloned().collect();
                if items.is_empty() {
                    return Ok(Value::Lst(Lst::new("[", ']', Vec::new())));
                }
                let mut iter = items.into_iter();
                let mut acc = iter.next().expect("checked non-empty");
                let mut out = vec![acc.clone()];
                for item in iter {
                    acc = self.apply(op.clone(), vec![acc, item]).await?;
                    out.push(acc.clone());
                }
                Ok(Value::Lst(Lst::new("[", ']', out)))
            }
            other => Err(EvalError::Type(format!(
                "cannot scan over {}",
                other.kind_name()
            ))),
        }
    }
}

/// Identity registry for fold over an empty strand, keyed by the
/// verb's spelling. User-defined 2-arity verbs have no identity and
/// fail on empty input.
fn fold_identity(op: &Value) -> EvalResult<Value> {
    let name = match op {
        Value::Jsf(JsFn {
            host: HostFn::Prim(name),
            ..
        }) => name.as_str(),
        _ => "",
    };
    match name {
        "+" => Ok(Value::Int(0)),
        "*" => Ok(Value::Int(1)),
        "min" => Ok(Value::Num(f64::INFINITY)),
        "max" => Ok(Value::Num(f64::NEG_INFINITY)),
        _ => Err(EvalError::Type(format!(
            "no identity for `{}` over an empty sequence",
            crate::show(op)
        ))),
    }
}

/// Scan intermediates keep the strand kind: all-INT stays INTs, any
/// NUM promotes to NUMs.
fn numeric_vector(values: Vec<Value>) -> Value {
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        Value::Ints(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Int(n) => n,
                    _ => unreachable!(),
                })
                .collect(),
        )
    } else if values
        .iter()
        .all(|v| matches!(v, Value::Int(_) | Value::Num(_)))
    {
        Value::Nums(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Int(n) => n as f64,
                    Value::Num(n) => n,
                    _ => unreachable!(),
                })
                .collect(),
        )
    } else {
        Value::Lst(Lst::new("[", ']', values))
    }
}

fn single(mut args: Vec<Value>) -> EvalResult<Value> {
    match args.len() {
        1 => Ok(args.pop().expect("length checked")),
        n => Err(EvalError::Arity(format!("expected 1 argument, got {}", n))),
    }
}
