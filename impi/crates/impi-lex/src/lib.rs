//! impi-lex - Loader (lexer + delimited-tree builder)
//!
//! The loader converts source text into the uniform token tree the
//! rest of the interpreter works on. It accepts text in chunks and
//! yields a tree only when the input is balanced, which is what lets a
//! REPL detect continuation lines without backtracking:
//!
//! ```
//! use impi_lex::{Loader, Value};
//!
//! let mut loader = Loader::new();
//! loader.send("echo [1 2");
//! assert!(!loader.ready());
//! loader.send(" 3]");
//! assert!(loader.ready());
//! assert!(matches!(loader.read(), Value::Top(_)));
//! ```
//!
//! Comment groups (`.:` … `:.`) are tracked like any other delimited
//! group but discarded when they close. Every other group becomes an
//! LST value tagged with its full opener text, so `foo[`, `` `[ ``,
//! `:[`, and `'[` survive into evaluation.

mod cursor;
mod edge_cases;
mod error;
mod scan;
pub mod value;

pub use error::LoadError;
pub use value::{HostFn, IfnDef, JsFn, Lst, Part, SepKind, Sym, SymKind, Value};

use scan::{Closer, RawToken, Scan};

/// An open group awaiting its closer.
struct Group {
    /// Full opener text (`[`, `foo[`, `.:`, …).
    open: String,
    closer: Closer,
    items: Vec<Value>,
}

/// Incremental source loader.
///
/// `send` appends text and consumes tokens eagerly; `ready` reports
/// whether a balanced tree is available; `read` snapshots the tree (or
/// an ERR value) and resets. Only strings wait for more input; every
/// other token class is consumed as soon as it appears.
pub struct Loader {
    /// Unconsumed input. Non-empty between sends only when an
    /// unterminated string or fence is waiting for its closing quote.
    buf: String,
    stack: Vec<Group>,
    root: Vec<Value>,
    errors: Vec<LoadError>,
    /// The scanner stopped inside a string or fence.
    in_string: bool,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            stack: Vec::new(),
            root: Vec::new(),
            errors: Vec::new(),
            in_string: false,
        }
    }

    /// One-shot load of a complete source text.
    ///
    /// Equivalent to `send` followed by `read`; unterminated strings
    /// and unclosed groups become ERR values, matching end-of-file
    /// semantics.
    pub fn load(text: &str) -> Value {
        let mut loader = Loader::new();
        loader.send(text);
        loader.read()
    }

    /// Append a chunk of input and consume as many tokens as possible.
    pub fn send(&mut self, text: &str) {
        self.buf.push_str(text);
        self.in_string = false;

        let mut pos = 0;
        loop {
            match scan::scan_token(&self.buf[pos..]) {
                Scan::Token(token, consumed) => {
                    pos += consumed;
                    self.accept(token);
                }
                Scan::Exhausted(consumed) => {
                    pos += consumed;
                    break;
                }
                Scan::Incomplete => {
                    self.in_string = true;
                    break;
                }
                Scan::Error { message, skip } => {
                    self.errors.push(LoadError::Lex(message));
                    pos += skip.max(1);
                }
            }
        }
        self.buf.drain(..pos);
    }

    /// True when the buffer is drained and no group is open.
    ///
    /// A not-ready loader wants more input (REPL continuation); a ready
    /// loader will produce either a TOP or, if errors were recorded, an
    /// ERR from `read`.
    pub fn ready(&self) -> bool {
        self.buf.is_empty() && self.stack.is_empty()
    }

    /// Snapshot the loaded tree and reset.
    ///
    /// Not ready ⇒ an ERR naming what is missing (without resetting, so
    /// the host can keep feeding input). Ready with recorded errors ⇒
    /// an ERR with the first message, and the loader resets.
    pub fn read(&mut self) -> Value {
        if !self.ready() {
            if self.in_string {
                return Value::Err(LoadError::UnterminatedString.to_string());
            }
            if let Some(group) = self.stack.last() {
                return Value::Err(format!("unclosed `{}`", group.open));
            }
            return Value::Err("incomplete input".to_string());
        }

        if let Some(first) = self.errors.first() {
            let message = first.to_string();
            self.reset();
            return Value::Err(message);
        }

        Value::Top(std::mem::take(&mut self.root))
    }

    /// Discard all buffered state.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.stack.clear();
        self.root.clear();
        self.errors.clear();
        self.in_string = false;
    }

    /// Errors recorded since the last successful `read`.
    pub fn errors(&self) -> &[LoadError] {
        &self.errors
    }

    fn accept(&mut self, token: RawToken) {
        match token {
            RawToken::Open(text) => {
                let closer = if text == ".:" {
                    Closer::Comment
                } else {
                    Closer::for_bracket(text.chars().last().unwrap_or('['))
                };
                self.stack.push(Group {
                    open: text,
                    closer,
                    items: Vec::new(),
                });
            }
            RawToken::Close(closer) => self.close_group(closer),
            RawToken::Sep(kind) => self.attach(Value::Sep(kind)),
            RawToken::Int(n) => self.attach(Value::Int(n)),
            RawToken::Num(n) => self.attach(Value::Num(n)),
            RawToken::Str(s) => self.attach(Value::Str(s)),
            RawToken::Mls(s) => self.attach(Value::Mls(s)),
            RawToken::Sym(sym) => self.attach(Value::Sym(sym)),
        }
    }

    fn close_group(&mut self, closer: Closer) {
        match self.stack.last() {
            None => self.errors.push(LoadError::UnexpectedCloser(closer.as_str())),
            Some(top) if top.closer != closer => {
                // Record and leave the stack alone; the right closer may
                // still arrive.
                self.errors.push(LoadError::MismatchedCloser {
                    expected: top.closer.as_str(),
                    found: closer.as_str(),
                });
            }
            Some(_) => {
                let group = self.stack.pop().unwrap();
                if group.closer == Closer::Comment {
                    return;
                }
                let value = Value::Lst(Lst::new(
                    &group.open,
                    group.closer.close_char(),
                    group.items,
                ));
                self.attach(value);
            }
        }
    }

    fn attach(&mut self, value: Value) {
        match self.stack.last_mut() {
            Some(group) => group.items.push(value),
            None => self.root.push(value),
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{SepKind, SymKind};

    fn top(text: &str) -> Vec<Value> {
        match Loader::load(text) {
            Value::Top(items) => items,
            other => panic!("expected TOP for {:?}, got {:?}", text, other),
        }
    }

    fn err(text: &str) -> String {
        match Loader::load(text) {
            Value::Err(message) => message,
            other => panic!("expected ERR for {:?}, got {:?}", text, other),
        }
    }

    #[test]
    fn test_flat_sequence() {
        let items = top("x: 1 2 3");
        assert_eq!(items.len(), 4);
        assert!(matches!(&items[0], Value::Sym(s) if s.kind == SymKind::Set));
        assert_eq!(items[1], Value::Int(1));
        assert_eq!(items[3], Value::Int(3));
    }

    #[test]
    fn test_nested_groups_carry_their_delimiters() {
        let items = top("echo[+[2;3]]");
        assert_eq!(items.len(), 1);
        let Value::Lst(outer) = &items[0] else {
            panic!("expected LST")
        };
        assert_eq!(outer.open.as_str(), "echo[");
        assert_eq!(outer.close, ']');

        let Value::Lst(inner) = &outer.items[0] else {
            panic!("expected inner LST")
        };
        assert_eq!(inner.open.as_str(), "+[");
        assert_eq!(
            inner.items,
            vec![Value::Int(2), Value::Sep(SepKind::Semi), Value::Int(3)]
        );
    }

    #[test]
    fn test_every_lst_open_close_pairs() {
        fn check(value: &Value) {
            if let Value::Lst(lst) = value {
                let expected = match lst.bracket() {
                    '[' => ']',
                    '(' => ')',
                    '{' => '}',
                    other => panic!("unexpected bracket {:?}", other),
                };
                assert_eq!(lst.close, expected);
                lst.items.iter().for_each(check);
            }
        }
        for item in top("a[(1) {2} `[3] '[4] :[`k 5]]") {
            check(&item);
        }
    }

    #[test]
    fn test_comments_are_discarded() {
        let items = top("echo .: note :. \"hi\"");
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Value::Sym(s) if s.name.as_str() == "echo"));
        assert_eq!(items[1], Value::Str("hi".to_string()));
    }

    #[test]
    fn test_comment_group_tokens_never_attach() {
        let items = top("1 .: 2 [3; 4] :. 5");
        assert_eq!(items, vec![Value::Int(1), Value::Int(5)]);
    }

    #[test]
    fn test_continuation_across_sends() {
        let mut loader = Loader::new();
        loader.send("[1 2");
        assert!(!loader.ready());
        loader.send(" 3]");
        assert!(loader.ready());
        let Value::Top(items) = loader.read() else {
            panic!("expected TOP")
        };
        let Value::Lst(lst) = &items[0] else {
            panic!("expected LST")
        };
        assert_eq!(
            lst.items,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn test_string_split_across_sends() {
        let mut loader = Loader::new();
        loader.send("\"ab");
        assert!(!loader.ready());
        loader.send("c\"");
        assert!(loader.ready());
        let Value::Top(items) = loader.read() else {
            panic!("expected TOP")
        };
        assert_eq!(items, vec![Value::Str("abc".to_string())]);
    }

    #[test]
    fn test_read_while_waiting_reports_continuation() {
        let mut loader = Loader::new();
        loader.send("(1 2");
        assert_eq!(loader.read(), Value::Err("unclosed `(`".to_string()));
        // Reading while not ready must not drop the pending group.
        loader.send(")");
        assert!(loader.ready());
        assert!(matches!(loader.read(), Value::Top(_)));
    }

    #[test]
    fn test_unexpected_closer() {
        assert_eq!(err("1 ]"), "unexpected `]`");
    }

    #[test]
    fn test_mismatched_closer() {
        assert_eq!(err("(1] 2)"), "expected `)`, found `]`");
    }

    #[test]
    fn test_unterminated_string_is_load_error() {
        assert_eq!(err("\"abc"), "unterminated string");
        assert_eq!(err("echo \"abc\ndef"), "unterminated string");
    }

    #[test]
    fn test_loader_reusable_after_error() {
        let mut loader = Loader::new();
        loader.send("]");
        assert!(matches!(loader.read(), Value::Err(_)));
        loader.send("42");
        assert_eq!(loader.read(), Value::Top(vec![Value::Int(42)]));
    }

    #[test]
    fn test_separators_preserved_in_tree() {
        let items = top("1; 2, 3\n4 | 5");
        let seps: Vec<_> = items
            .iter()
            .filter_map(|v| match v {
                Value::Sep(kind) => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            seps,
            vec![SepKind::Semi, SepKind::Comma, SepKind::Newline, SepKind::Bar]
        );
    }

    #[test]
    fn test_empty_input_reads_empty_top() {
        assert_eq!(Loader::load(""), Value::Top(vec![]));
    }
}
