//! Built-in words.
//!
//! Primitives are JSF values whose host side is a name; dispatch is a
//! match over the spelling. Arithmetic and relational words are
//! element-wise over scalars and strand vectors with INT→NUM
//! promotion. `ite`, `while`, and `xmls` are quoted special forms:
//! their arguments arrive unevaluated and are run on demand.

use async_recursion::async_recursion;
use tracing::trace;

use impi_lex::value::{JsFn, Lst, Sym, SymKind, Value};
use impi_lex::Loader;
use impi_par::Parser;
use impi_util::{FxHashMap, Symbol};

use crate::caps::native_path;
use crate::error::{EvalError, EvalResult};
use crate::show::{display_text, show, xmls};
use crate::Evaluator;

/// Name and arity of every primitive (`-1` is variadic).
const PRIMS: &[(&str, i32)] = &[
    ("nil", 0),
    ("ok", 0),
    ("+", 2),
    ("-", 2),
    ("*", 2),
    ("%", 2),
    ("^", 2),
    ("min", 2),
    ("max", 2),
    ("<", 2),
    (">", 2),
    ("<=", 2),
    (">=", 2),
    ("=", 2),
    ("~=", 2),
    ("!", 1),
    ("tk", 2),
    ("rev", 1),
    ("len", 1),
    ("rd", 1),
    ("wr", 2),
    ("e?", 1),
    ("rm", 1),
    ("rln", 0),
    ("load", 1),
    ("echo", 1),
    ("show", 1),
    ("get", 1),
    ("set", 2),
    ("put", 3),
    ("at", 2),
    ("keys", 1),
    ("vals", 1),
    ("words", 0),
    ("part", 1),
    ("type?", 1),
];

/// Quoted special forms: arguments are taken unevaluated.
const SPECIALS: &[(&str, i32)] = &[("ite", 3), ("while", 2), ("xmls", 1)];

/// Register every built-in into a word dictionary.
pub(crate) fn install(words: &mut FxHashMap<Symbol, Value>) {
    for (name, arity) in PRIMS {
        words.insert(Symbol::intern(name), Value::Jsf(JsFn::prim(name, *arity)));
    }
    for (name, arity) in SPECIALS {
        words.insert(Symbol::intern(name), Value::Jsf(JsFn::special(name, *arity)));
    }
}

impl Evaluator {
    /// Primitive dispatch. Arity has been enforced by the caller.
    #[async_recursion(?Send)]
    pub(crate) async fn apply_prim(&mut self, name: Symbol, args: Vec<Value>) -> EvalResult<Value> {
        trace!(word = name.as_str(), "apply");
        match name.as_str() {
            "nil" | "ok" => Ok(Value::Nil),

            "+" | "-" | "*" | "%" | "^" | "min" | "max" => {
                let [a, b] = two(args)?;
                arith(name.as_str(), a, b)
            }
            "<" | ">" | "<=" | ">=" | "=" | "~=" => {
                let [a, b] = two(args)?;
                compare(name.as_str(), a, b)
            }

            "!" => iota(one(args)?),
            "tk" => {
                let [count, source] = two(args)?;
                take(count, source)
            }
            "rev" => Ok(reverse(one(args)?)),
            "len" => length(&one(args)?),

            "rd" => {
                let path = path_of(&one(args)?)?;
                Ok(Value::Str(self.files.read(&path).await?))
            }
            "wr" => {
                let [target, content] = two(args)?;
                let path = path_of(&target)?;
                self.files.write(&path, &display_text(&content)).await?;
                Ok(Value::Nil)
            }
            "e?" => {
                let path = path_of(&one(args)?)?;
                Ok(Value::Int(self.files.exists(&path).await? as i64))
            }
            "rm" => {
                let path = path_of(&one(args)?)?;
                self.files.remove(&path).await?;
                Ok(Value::Nil)
            }
            "rln" => Ok(self
                .input
                .read_line()
                .await?
                .map(Value::Str)
                .unwrap_or(Value::Nil)),

            "load" => self.load_word(one(args)?).await,
            "echo" => {
                let text = display_text(&one(args)?);
                self.output.write_line(&text).await?;
                Ok(Value::Nil)
            }
            "show" => Ok(Value::Str(show(&one(args)?))),
            "xmls" => Ok(Value::Str(xmls(&one(args)?))),

            "get" => {
                let key = word_key(&one(args)?)?;
                self.words
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| EvalError::Lookup(key.as_str().to_string()))
            }
            "set" => {
                let [key, value] = two(args)?;
                let key = word_key(&key)?;
                self.words.insert(key, value.clone());
                Ok(value)
            }
            "put" => {
                let [dct, key, value] = three(args)?;
                let Value::Dct(mut map) = dct else {
                    return Err(EvalError::Type(format!(
                        "put expects a DCT, got {}",
                        dct.kind_name()
                    )));
                };
                map.insert(word_key(&key)?, value);
                Ok(Value::Dct(map))
            }
            "at" => {
                let [container, key] = two(args)?;
                at(container, key)
            }
            "keys" => match one(args)? {
                Value::Dct(map) => Ok(Value::Syms(
                    map.keys()
                        .map(|name| Sym {
                            name: *name,
                            kind: SymKind::Bqt,
                        })
                        .collect(),
                )),
                other => Err(EvalError::Type(format!(
                    "keys expects a DCT, got {}",
                    other.kind_name()
                ))),
            },
            "vals" => match one(args)? {
                Value::Dct(map) => Ok(Value::Lst(Lst::new(
                    "[",
                    ']',
                    map.into_values().collect(),
                ))),
                other => Err(EvalError::Type(format!(
                    "vals expects a DCT, got {}",
                    other.kind_name()
                ))),
            },

            "ite" => {
                let [cond, then_thunk, else_thunk] = three(args)?;
                if self.eval_thunk(&cond).await?.is_truthy() {
                    self.eval_thunk(&then_thunk).await
                } else {
                    self.eval_thunk(&else_thunk).await
                }
            }
            "while" => {
                let [cond, body] = two(args)?;
                while self.eval_thunk(&cond).await?.is_truthy() {
                    self.eval_thunk(&body).await?;
                }
                Ok(Value::Nil)
            }

            "words" => {
                let mut names: Vec<&'static str> =
                    self.words.keys().map(|k| k.as_str()).collect();
                names.sort_unstable();
                Ok(Value::Syms(
                    names
                        .into_iter()
                        .map(|name| Sym::new(name, SymKind::Bqt))
                        .collect(),
                ))
            }
            "part" => Ok(Value::Str(one(args)?.part().letter().to_string())),
            "type?" => Ok(Value::Str(one(args)?.kind_name().to_string())),

            other => Err(EvalError::Type(format!("unknown primitive `{}`", other))),
        }
    }

    /// `load`: parse a string, or read a file/URL symbol and parse it.
    /// Load failures come back as ERR values, not evaluation errors.
    async fn load_word(&mut self, arg: Value) -> EvalResult<Value> {
        match arg {
            Value::Str(source) | Value::Mls(source) => Ok(parse_source(&source)),
            Value::Sym(sym) if matches!(sym.kind, SymKind::File | SymKind::Url) => {
                let path = path_of(&Value::Sym(sym))?;
                let text = self.files.read(&path).await?;
                Ok(parse_source(&text))
            }
            other => Err(EvalError::Type(format!(
                "load expects a STR or file symbol, got {}",
                other.kind_name()
            ))),
        }
    }
}

fn parse_source(text: &str) -> Value {
    Parser::new().parse(Loader::load(text))
}

// ---------------------------------------------------------------------
// Argument plumbing
// ---------------------------------------------------------------------

fn one(mut args: Vec<Value>) -> EvalResult<Value> {
    match args.len() {
        1 => Ok(args.pop().expect("length checked")),
        n => Err(EvalError::Arity(format!("expected 1 argument, got {}", n))),
    }
}

fn two(args: Vec<Value>) -> EvalResult<[Value; 2]> {
    <[Value; 2]>::try_from(args)
        .map_err(|args| EvalError::Arity(format!("expected 2 arguments, got {}", args.len())))
}

fn three(args: Vec<Value>) -> EvalResult<[Value; 3]> {
    <[Value; 3]>::try_from(args)
        .map_err(|args| EvalError::Arity(format!("expected 3 arguments, got {}", args.len())))
}

/// Word-dictionary key from a symbol (any variant) or a string.
fn word_key(value: &Value) -> EvalResult<Symbol> {
    match value {
        Value::Sym(sym) => Ok(sym.name),
        Value::Str(s) => Ok(Symbol::intern(s)),
        other => Err(EvalError::Type(format!(
            "expected a word name, got {}",
            other.kind_name()
        ))),
    }
}

/// Native path from a file/URL/path symbol or a string.
fn path_of(value: &Value) -> EvalResult<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        Value::Sym(sym) => match sym.kind {
            SymKind::File => Ok(native_path(sym.name.as_str())),
            SymKind::Url | SymKind::Path | SymKind::Raw => Ok(sym.name.as_str().to_string()),
            _ => Err(EvalError::Type(format!(
                "expected a file path, got `{}`",
                sym.spelling()
            ))),
        },
        other => Err(EvalError::Type(format!(
            "expected a file path, got {}",
            other.kind_name()
        ))),
    }
}

// ---------------------------------------------------------------------
// Numeric kernels
// ---------------------------------------------------------------------

/// A numeric operand: scalar or strand.
enum Operand {
    Int(i64),
    Num(f64),
    Ints(Vec<i64>),
    Nums(Vec<f64>),
}

impl Operand {
    fn from_value(value: Value, op: &str) -> EvalResult<Operand> {
        match value {
            Value::Int(n) => Ok(Operand::Int(n)),
            Value::Num(n) => Ok(Operand::Num(n)),
            Value::Ints(v) => Ok(Operand::Ints(v)),
            Value::Nums(v) => Ok(Operand::Nums(v)),
            other => Err(EvalError::Type(format!(
                "`{}` expects numeric operands, got {}",
                op,
                other.kind_name()
            ))),
        }
    }

    fn has_num(&self) -> bool {
        matches!(self, Operand::Num(_) | Operand::Nums(_))
    }

    fn has_negative(&self) -> bool {
        match self {
            Operand::Int(n) => *n < 0,
            Operand::Num(n) => *n < 0.0,
            Operand::Ints(v) => v.iter().any(|n| *n < 0),
            Operand::Nums(v) => v.iter().any(|n| *n < 0.0),
        }
    }
}

/// Scalar-or-vector float side.
enum NumSide {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Operand {
    fn to_nums(self) -> NumSide {
        match self {
            Operand::Int(n) => NumSide::Scalar(n as f64),
            Operand::Num(n) => NumSide::Scalar(n),
            Operand::Ints(v) => NumSide::Vector(v.into_iter().map(|n| n as f64).collect()),
            Operand::Nums(v) => NumSide::Vector(v),
        }
    }
}

/// Element-wise arithmetic with INT→NUM promotion. `^` with a negative
/// exponent promotes to floats so integer powers stay closed.
fn arith(op: &str, a: Value, b: Value) -> EvalResult<Value> {
    let a = Operand::from_value(a, op)?;
    let b = Operand::from_value(b, op)?;

    if a.has_num() || b.has_num() || (op == "^" && b.has_negative()) {
        broadcast_num(op, a.to_nums(), b.to_nums())
    } else {
        broadcast_int(op, a, b)
    }
}

fn broadcast_int(op: &str, a: Operand, b: Operand) -> EvalResult<Value> {
    match (a, b) {
        (Operand::Int(x), Operand::Int(y)) => Ok(Value::Int(int_binary(op, x, y)?)),
        (Operand::Ints(xs), Operand::Int(y)) => Ok(Value::Ints(
            xs.into_iter()
                .map(|x| int_binary(op, x, y))
                .collect::<EvalResult<_>>()?,
        )),
        (Operand::Int(x), Operand::Ints(ys)) => Ok(Value::Ints(
            ys.into_iter()
                .map(|y| int_binary(op, x, y))
                .collect::<EvalResult<_>>()?,
        )),
        (Operand::Ints(xs), Operand::Ints(ys)) => {
            check_lengths(op, xs.len(), ys.len())?;
            Ok(Value::Ints(
                xs.into_iter()
                    .zip(ys)
                    .map(|(x, y)| int_binary(op, x, y))
                    .collect::<EvalResult<_>>()?,
            ))
        }
        _ => unreachable!("float operands take the num path"),
    }
}

fn broadcast_num(op: &str, a: NumSide, b: NumSide) -> EvalResult<Value> {
    match (a, b) {
        (NumSide::Scalar(x), NumSide::Scalar(y)) => Ok(Value::Num(num_binary(op, x, y)?)),
        (NumSide::Vector(xs), NumSide::Scalar(y)) => Ok(Value::Nums(
            xs.into_iter()
                .map(|x| num_binary(op, x, y))
                .collect::<EvalResult<_>>()?,
        )),
        (NumSide::Scalar(x), NumSide::Vector(ys)) => Ok(Value::Nums(
            ys.into_iter()
                .map(|y| num_binary(op, x, y))
                .collect::<EvalResult<_>>()?,
        )),
        (NumSide::Vector(xs), NumSide::Vector(ys)) => {
            check_lengths(op, xs.len(), ys.len())?;
            Ok(Value::Nums(
                xs.into_iter()
                    .zip(ys)
                    .map(|(x, y)| num_binary(op, x, y))
                    .collect::<EvalResult<_>>()?,
            ))
        }
    }
}

fn check_lengths(op: &str, a: usize, b: usize) -> EvalResult<()> {
    if a != b {
        return Err(EvalError::Type(format!(
            "`{}` length mismatch: {} vs {}",
            op, a, b
        )));
    }
    Ok(())
}

fn int_binary(op: &str, x: i64, y: i64) -> EvalResult<i64> {
    match op {
        "+" => Ok(x.wrapping_add(y)),
        "-" => Ok(x.wrapping_sub(y)),
        "*" => Ok(x.wrapping_mul(y)),
        "%" => {
            if y == 0 {
                return Err(EvalError::Type("division by zero".to_string()));
            }
            Ok(x / y)
        }
        "^" => {
            let exp = u32::try_from(y)
                .map_err(|_| EvalError::Type("integer power out of range".to_string()))?;
            x.checked_pow(exp)
                .ok_or_else(|| EvalError::Type("integer overflow in power".to_string()))
        }
        "min" => Ok(x.min(y)),
        "max" => Ok(x.max(y)),
        _ => unreachable!("not an arithmetic word: {}", op),
    }
}

fn num_binary(op: &str, x: f64, y: f64) -> EvalResult<f64> {
    match op {
        "+" => Ok(x + y),
        "-" => Ok(x - y),
        "*" => Ok(x * y),
        "%" => {
            if y == 0.0 {
                return Err(EvalError::Type("division by zero".to_string()));
            }
            Ok((x / y).trunc())
        }
        "^" => Ok(x.powf(y)),
        "min" => Ok(x.min(y)),
        "max" => Ok(x.max(y)),
        _ => unreachable!("not an arithmetic word: {}", op),
    }
}

/// Element-wise relational words; `=`/`~=` also compare non-numeric
/// values structurally.
fn compare(op: &str, a: Value, b: Value) -> EvalResult<Value> {
    let numeric = |v: &Value| {
        matches!(
            v,
            Value::Int(_) | Value::Num(_) | Value::Ints(_) | Value::Nums(_)
        )
    };

    if numeric(&a) && numeric(&b) {
        let a = Operand::from_value(a, op)?.to_nums();
        let b = Operand::from_value(b, op)?.to_nums();
        return match (a, b) {
            (NumSide::Scalar(x), NumSide::Scalar(y)) => Ok(Value::Int(relation(op, x, y) as i64)),
            (NumSide::Vector(xs), NumSide::Scalar(y)) => Ok(Value::Ints(
                xs.into_iter().map(|x| relation(op, x, y) as i64).collect(),
            )),
            (NumSide::Scalar(x), NumSide::Vector(ys)) => Ok(Value::Ints(
                ys.into_iter().map(|y| relation(op, x, y) as i64).collect(),
            )),
            (NumSide::Vector(xs), NumSide::Vector(ys)) => {
                check_lengths(op, xs.len(), ys.len())?;
                Ok(Value::Ints(
                    xs.into_iter()
                        .zip(ys)
                        .map(|(x, y)| relation(op, x, y) as i64)
                        .collect(),
                ))
            }
        };
    }

    match op {
        "=" => Ok(Value::Int((a == b) as i64)),
        "~=" => Ok(Value::Int((a != b) as i64)),
        _ => Err(EvalError::Type(format!(
            "`{}` expects numeric operands, got {} and {}",
            op,
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

fn relation(op: &str, x: f64, y: f64) -> bool {
    match op {
        "<" => x < y,
        ">" => x > y,
        "<=" => x <= y,
        ">=" => x >= y,
        "=" => x == y,
        "~=" => x != y,
        _ => unreachable!("not a relational word: {}", op),
    }
}

// ---------------------------------------------------------------------
// Array words
// ---------------------------------------------------------------------

/// `! n`: the first `n` naturals as a NUMs vector.
fn iota(count: Value) -> EvalResult<Value> {
    let Value::Int(n) = count else {
        return Err(EvalError::Type(format!(
            "! expects an INT, got {}",
            count.kind_name()
        )));
    };
    if n < 0 {
        return Err(EvalError::Type("! expects a non-negative count".to_string()));
    }
    Ok(Value::Nums((0..n).map(|i| i as f64).collect()))
}

/// `tk`: take `n` with cycling.
fn take(count: Value, source: Value) -> EvalResult<Value> {
    let Value::Int(n) = count else {
        return Err(EvalError::Type(format!(
            "tk expects an INT count, got {}",
            count.kind_name()
        )));
    };
    if n < 0 {
        return Err(EvalError::Type("tk count must be non-negative".to_string()));
    }
    let n = n as usize;

    fn cycled<T: Clone>(items: &[T], n: usize) -> EvalResult<Vec<T>> {
        if items.is_empty() {
            return Err(EvalError::Type("tk from an empty sequence".to_string()));
        }
        Ok(items.iter().cycle().take(n).cloned().collect())
    }

    match source {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(cycled(&chars, n)?.into_iter().collect()))
        }
        Value::Ints(v) => Ok(Value::Ints(cycled(&v, n)?)),
        Value::Nums(v) => Ok(Value::Nums(cycled(&v, n)?)),
        Value::Syms(v) => Ok(Value::Syms(cycled(&v, n)?)),
        Value::Lst(lst) => {
            let items: Vec<Value> = lst.items.iter().filter(|i| !i.is_sep()).cloned().collect();
            Ok(Value::Lst(Lst::new("[", ']', cycled(&items, n)?)))
        }
        Value::Int(scalar) => Ok(Value::Ints(vec![scalar; n])),
        Value::Num(scalar) => Ok(Value::Nums(vec![scalar; n])),
        other => Err(EvalError::Type(format!(
            "tk cannot take from {}",
            other.kind_name()
        ))),
    }
}

fn reverse(value: Value) -> Value {
    match value {
        Value::Str(s) => Value::Str(s.chars().rev().collect()),
        Value::Mls(s) => Value::Mls(s.chars().rev().collect()),
        Value::Ints(mut v) => {
            v.reverse();
            Value::Ints(v)
        }
        Value::Nums(mut v) => {
            v.reverse();
            Value::Nums(v)
        }
        Value::Syms(mut v) => {
            v.reverse();
            Value::Syms(v)
        }
        Value::Lst(mut lst) => {
            lst.items.reverse();
            Value::Lst(lst)
        }
        Value::Top(mut items) => {
            items.reverse();
            Value::Top(items)
        }
        scalar => scalar,
    }
}

/// Sequence length; scalars have length 1.
fn length(value: &Value) -> EvalResult<Value> {
    let n = match value {
        Value::Str(s) | Value::Mls(s) => s.chars().count(),
        Value::Ints(v) => v.len(),
        Value::Nums(v) => v.len(),
        Value::Syms(v) => v.len(),
        Value::Lst(lst) => lst.items.iter().filter(|i| !i.is_sep()).count(),
        Value::Top(items) => items.iter().filter(|i| !i.is_sep()).count(),
        Value::Dct(map) => map.len(),
        _ => 1,
    };
    Ok(Value::Int(n as i64))
}

/// `at`: dictionary by quoted key, sequences by 0-based index.
fn at(container: Value, key: Value) -> EvalResult<Value> {
    if let Value::Dct(map) = &container {
        let Value::Sym(sym) = &key else {
            return Err(EvalError::Type(format!(
                "at expects a symbol key for a DCT, got {}",
                key.kind_name()
            )));
        };
        return Evaluator::dct_lookup(map, sym);
    }

    let Value::Int(index) = key else {
        return Err(EvalError::Type(format!(
            "at expects an INT index, got {}",
            key.kind_name()
        )));
    };
    let index = usize::try_from(index)
        .map_err(|_| EvalError::Type(format!("index out of range: {}", index)))?;

    let out_of_range = || EvalError::Type(format!("index out of range: {}", index));
    match container {
        Value::Str(s) => s
            .chars()
            .nth(index)
            .map(|c| Value::Str(c.to_string()))
            .ok_or_else(out_of_range),
        Value::Ints(v) => v.get(index).map(|n| Value::Int(*n)).ok_or_else(out_of_range),
        Value::Nums(v) => v.get(index).map(|n| Value::Num(*n)).ok_or_else(out_of_range),
        Value::Syms(v) => v
            .get(index)
            .map(|s| Value::Sym(*s))
            .ok_or_else(out_of_range),
        Value::Lst(lst) => {
            let items: Vec<&Value> = lst.items.iter().filter(|i| !i.is_sep()).collect();
            items.get(index).map(|v| (*v).clone()).ok_or_else(out_of_range)
        }
        other => Err(EvalError::Type(format!(
            "at cannot index {}",
            other.kind_name()
        ))),
    }
}
