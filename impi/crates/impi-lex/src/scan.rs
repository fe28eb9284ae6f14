//! Token scanning.
//!
//! One [`scan_token`] call classifies the head of the unconsumed
//! buffer. Token classes are tried in a fixed priority order:
//! whitespace, separators, numbers, strings, fenced multi-line
//! strings, comment delimiters, openers, closers, then the symbol
//! taxonomy with catch-all RAW. The scanner is incremental-friendly:
//! only strings and fences report [`Scan::Incomplete`] and wait for
//! more input; every other class consumes eagerly.

use crate::cursor::Cursor;
use crate::value::{SepKind, Sym, SymKind};

/// A closing delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closer {
    Square,
    Round,
    Curly,
    Comment,
}

impl Closer {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Closer::Square => "]",
            Closer::Round => ")",
            Closer::Curly => "}",
            Closer::Comment => ":.",
        }
    }

    /// The closer matching an opener's final character.
    pub(crate) fn for_bracket(bracket: char) -> Closer {
        match bracket {
            '[' => Closer::Square,
            '(' => Closer::Round,
            '{' => Closer::Curly,
            _ => Closer::Comment,
        }
    }

    /// The literal close character stored on LST nodes.
    pub(crate) fn close_char(self) -> char {
        match self {
            Closer::Square => ']',
            Closer::Round => ')',
            Closer::Curly => '}',
            Closer::Comment => '.',
        }
    }
}

/// A scanned token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawToken {
    Sep(SepKind),
    Int(i64),
    Num(f64),
    Str(String),
    Mls(String),
    /// Full opener text, bracket included (`foo[`, `` `[ ``, `.:`, …).
    Open(String),
    Close(Closer),
    Sym(Sym),
}

/// Outcome of one scanning step.
#[derive(Debug, PartialEq)]
pub(crate) enum Scan {
    /// A token plus total bytes consumed (leading whitespace included).
    Token(RawToken, usize),
    /// Only whitespace remained; consume the given bytes.
    Exhausted(usize),
    /// The head may still grow (unterminated string or fence); wait
    /// for more input.
    Incomplete,
    /// Unscannable input: record the message and skip the given bytes
    /// to resynchronize.
    Error { message: String, skip: usize },
}

/// Characters that can appear inside a symbol run.
pub(crate) fn is_sym_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '"' | '[' | ']' | '(' | ')' | '{' | '}' | ';' | '|' | ',')
}

/// Scan one token from the head of `input`.
pub(crate) fn scan_token(input: &str) -> Scan {
    let mut cur = Cursor::new(input);
    cur.eat_while(|c| c.is_whitespace() && c != '\n');
    let ws = cur.pos();

    let Some(head) = cur.peek() else {
        return Scan::Exhausted(ws);
    };

    match head {
        ';' => Scan::Token(RawToken::Sep(SepKind::Semi), ws + 1),
        '|' => Scan::Token(RawToken::Sep(SepKind::Bar), ws + 1),
        '\n' => Scan::Token(RawToken::Sep(SepKind::Newline), ws + 1),
        ',' => scan_comma(&mut cur, ws),
        '"' => scan_string(cur.rest(), ws),
        ']' => Scan::Token(RawToken::Close(Closer::Square), ws + 1),
        ')' => Scan::Token(RawToken::Close(Closer::Round), ws + 1),
        '}' => Scan::Token(RawToken::Close(Closer::Curly), ws + 1),
        '[' | '(' | '{' => Scan::Token(RawToken::Open(head.to_string()), ws + 1),
        _ => {
            if cur.starts_with("```") {
                return scan_fence(cur.rest(), ws);
            }
            if cur.starts_with(".:") {
                return Scan::Token(RawToken::Open(".:".to_string()), ws + 2);
            }
            if cur.starts_with(":.") {
                return Scan::Token(RawToken::Close(Closer::Comment), ws + 2);
            }
            if let Some((token, len)) = scan_number(cur.rest()) {
                return Scan::Token(token, ws + len);
            }
            scan_symbol_or_opener(&mut cur, ws)
        }
    }
}

/// `,name` is an unquote symbol; a bare comma is the comma separator.
fn scan_comma(cur: &mut Cursor<'_>, ws: usize) -> Scan {
    cur.bump();
    if cur.peek().is_some_and(is_sym_char) {
        let run = cur.eat_while(is_sym_char);
        Scan::Token(
            RawToken::Sym(Sym::new(run, SymKind::Unq)),
            ws + 1 + run.len(),
        )
    } else {
        Scan::Token(RawToken::Sep(SepKind::Comma), ws + 1)
    }
}

/// Numeric literals: float, integer-with-exponent, then integer.
/// Returns the token and its byte length, or None when the head is
/// not numeric.
fn scan_number(rest: &str) -> Option<(RawToken, usize)> {
    let bytes = rest.as_bytes();
    let mut i = 0;

    if bytes.first() == Some(&b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == int_start {
        return None;
    }

    let mut is_float = false;

    // Fraction: a dot counts only when digits follow it.
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        is_float = true;
    }

    // Exponent: optional sign, at least one digit.
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
            is_float = true;
        }
    }

    let text = &rest[..i];
    let token = if is_float {
        RawToken::Num(text.parse::<f64>().ok()?)
    } else {
        match text.parse::<i64>() {
            Ok(n) => RawToken::Int(n),
            // Out-of-range integers degrade to floats.
            Err(_) => RawToken::Num(text.parse::<f64>().ok()?),
        }
    };
    Some((token, i))
}

/// Double-quoted single-line string with backslash escapes.
fn scan_string(rest: &str, ws: usize) -> Scan {
    let mut out = String::new();
    let mut chars = rest.char_indices().skip(1).peekable();

    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Scan::Token(RawToken::Str(out), ws + idx + 1),
            '\n' => {
                // Leave the newline for the separator scanner.
                return Scan::Error {
                    message: "unterminated string".to_string(),
                    skip: ws + idx,
                };
            }
            '\\' => match chars.next() {
                None => return Scan::Incomplete,
                Some((_, esc)) => out.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                }),
            },
            c => out.push(c),
        }
    }
    Scan::Incomplete
}

/// ``` fenced multi-line string.
fn scan_fence(rest: &str, ws: usize) -> Scan {
    let body = &rest[3..];
    match body.find("```") {
        Some(end) => Scan::Token(RawToken::Mls(body[..end].to_string()), ws + 3 + end + 3),
        None => Scan::Incomplete,
    }
}

/// A symbol run, which becomes an opener when a bracket follows it
/// immediately.
fn scan_symbol_or_opener(cur: &mut Cursor<'_>, ws: usize) -> Scan {
    let run = cur.eat_while(is_sym_char);
    if run.is_empty() {
        // Unreachable for well-formed UTF-8 input (every non-delimiter
        // character is a symbol character), kept as resynchronization.
        return Scan::Error {
            message: format!("unrecognized input near `{}`", cur.rest().chars().next().unwrap_or(' ')),
            skip: ws + cur.peek().map_or(1, |c| c.len_utf8()),
        };
    }
    if let Some(bracket @ ('[' | '(' | '{')) = cur.peek() {
        cur.bump();
        return Scan::Token(
            RawToken::Open(format!("{}{}", run, bracket)),
            ws + run.len() + 1,
        );
    }
    Scan::Token(RawToken::Sym(classify_symbol(run)), ws + run.len())
}

/// Symbol taxonomy, tried in the documented priority order. Sigils
/// with an empty name fall through to RAW, as do trailing-`/` runs
/// (fold/scan spellings stay RAW for late synthesis).
fn classify_symbol(text: &str) -> Sym {
    let n = text.len();

    if text.starts_with("http://") || text.starts_with("https://") {
        return Sym::new(text, SymKind::Url);
    }
    if n > 2 && text.starts_with('.') && text.ends_with(':') {
        return Sym::new(&text[1..n - 1], SymKind::Kw);
    }
    if n > 2 && text.starts_with('!') && text.ends_with(':') {
        return Sym::new(&text[1..n - 1], SymKind::Kw2);
    }
    if n > 1 && text.ends_with(':') {
        return Sym::new(&text[..n - 1], SymKind::Set);
    }
    if n > 1 && text.starts_with('!') {
        return Sym::new(&text[1..], SymKind::Msg2);
    }
    if n > 1 && text.ends_with('!') {
        return Sym::new(&text[..n - 1], SymKind::Typ);
    }
    if n > 1 && text.starts_with('#') {
        return Sym::new(&text[1..], SymKind::Ish);
    }
    if n > 1 && text.starts_with('%') {
        return Sym::new(&text[1..], SymKind::File);
    }
    if text.ends_with('/') {
        // `op/` keeps its spelling; fold synthesis happens late.
        return Sym::new(text, SymKind::Raw);
    }
    if n > 1 && text.starts_with('/') {
        return Sym::new(&text[1..], SymKind::Refn);
    }
    if text.contains('/') {
        return Sym::new(text, SymKind::Path);
    }
    if n > 1 && text.starts_with('\'') {
        return Sym::new(&text[1..], SymKind::Lit);
    }
    if n > 1 && text.starts_with(':') {
        return Sym::new(&text[1..], SymKind::Get);
    }
    if n > 1 && text.starts_with('`') {
        return Sym::new(&text[1..], SymKind::Bqt);
    }
    if n > 1 && text.starts_with('@') {
        return Sym::new(&text[1..], SymKind::Ann);
    }
    if n > 1 && text.starts_with('.') {
        return Sym::new(&text[1..], SymKind::Msg);
    }
    if n > 1 && text.starts_with('?') {
        return Sym::new(&text[1..], SymKind::Err);
    }
    Sym::new(text, SymKind::Raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(input: &str) -> RawToken {
        match scan_token(input) {
            Scan::Token(tok, _) => tok,
            other => panic!("expected token for {:?}, got {:?}", input, other),
        }
    }

    fn sym(input: &str) -> Sym {
        match one(input) {
            RawToken::Sym(s) => s,
            other => panic!("expected symbol for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn test_separators() {
        assert_eq!(one(";"), RawToken::Sep(SepKind::Semi));
        assert_eq!(one("|"), RawToken::Sep(SepKind::Bar));
        assert_eq!(one("\n"), RawToken::Sep(SepKind::Newline));
        assert_eq!(one(", x"), RawToken::Sep(SepKind::Comma));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(one("42"), RawToken::Int(42));
        assert_eq!(one("-7 "), RawToken::Int(-7));
        assert_eq!(one("3.25"), RawToken::Num(3.25));
        assert_eq!(one("-1.5e2"), RawToken::Num(-150.0));
        assert_eq!(one("2e3"), RawToken::Num(2000.0));
    }

    #[test]
    fn test_number_boundaries() {
        // A dot without digits after it stays outside the number.
        assert_eq!(one("12."), RawToken::Int(12));
        // A dangling exponent marker stays outside too.
        assert_eq!(one("1e"), RawToken::Int(1));
        // Lone minus is the subtraction word.
        assert_eq!(sym("-").kind, SymKind::Raw);
    }

    #[test]
    fn test_strings() {
        assert_eq!(one(r#""hi""#), RawToken::Str("hi".to_string()));
        assert_eq!(
            one(r#""a\nb\t\"c\"""#),
            RawToken::Str("a\nb\t\"c\"".to_string())
        );
        assert_eq!(scan_token(r#""open"#), Scan::Incomplete);
    }

    #[test]
    fn test_string_with_newline_is_error() {
        match scan_token("\"oops\nrest") {
            Scan::Error { message, skip } => {
                assert!(message.contains("unterminated"));
                assert_eq!(skip, 5);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_fenced_multiline_string() {
        assert_eq!(
            one("```a\nb```"),
            RawToken::Mls("a\nb".to_string())
        );
        assert_eq!(scan_token("```still open"), Scan::Incomplete);
    }

    #[test]
    fn test_openers() {
        assert_eq!(one("["), RawToken::Open("[".to_string()));
        assert_eq!(one("("), RawToken::Open("(".to_string()));
        assert_eq!(one("{"), RawToken::Open("{".to_string()));
        assert_eq!(one("foo["), RawToken::Open("foo[".to_string()));
        assert_eq!(one("+["), RawToken::Open("+[".to_string()));
        assert_eq!(one("`["), RawToken::Open("`[".to_string()));
        assert_eq!(one("'["), RawToken::Open("'[".to_string()));
        assert_eq!(one(":["), RawToken::Open(":[".to_string()));
        assert_eq!(one(".:"), RawToken::Open(".:".to_string()));
    }

    #[test]
    fn test_closers() {
        assert_eq!(one("]"), RawToken::Close(Closer::Square));
        assert_eq!(one(")"), RawToken::Close(Closer::Round));
        assert_eq!(one("}"), RawToken::Close(Closer::Curly));
        assert_eq!(one(":."), RawToken::Close(Closer::Comment));
    }

    #[test]
    fn test_symbol_taxonomy() {
        assert_eq!(sym("foo").kind, SymKind::Raw);
        assert_eq!(sym("foo:").kind, SymKind::Set);
        assert_eq!(sym(":foo").kind, SymKind::Get);
        assert_eq!(sym("'foo").kind, SymKind::Lit);
        assert_eq!(sym("`foo").kind, SymKind::Bqt);
        assert_eq!(sym("%path").kind, SymKind::File);
        assert_eq!(sym("http://x.y/z").kind, SymKind::Url);
        assert_eq!(sym("a/b/c").kind, SymKind::Path);
        assert_eq!(sym("/foo").kind, SymKind::Refn);
        assert_eq!(sym("#foo").kind, SymKind::Ish);
        assert_eq!(sym("foo!").kind, SymKind::Typ);
        assert_eq!(sym("@foo").kind, SymKind::Ann);
        assert_eq!(sym(".foo").kind, SymKind::Msg);
        assert_eq!(sym(".foo:").kind, SymKind::Kw);
        assert_eq!(sym("!foo").kind, SymKind::Msg2);
        assert_eq!(sym("!foo:").kind, SymKind::Kw2);
        assert_eq!(sym("?foo").kind, SymKind::Err);
        assert_eq!(one(",foo"), RawToken::Sym(Sym::new("foo", SymKind::Unq)));
    }

    #[test]
    fn test_sigils_are_stripped() {
        assert_eq!(sym(":foo").name.as_str(), "foo");
        assert_eq!(sym("foo:").name.as_str(), "foo");
        assert_eq!(sym(".foo:").name.as_str(), "foo");
        assert_eq!(sym("!foo:").name.as_str(), "foo");
        assert_eq!(sym("foo!").name.as_str(), "foo");
        assert_eq!(sym("http://x/y").name.as_str(), "http://x/y");
    }

    #[test]
    fn test_fold_scan_spellings_stay_raw() {
        assert_eq!(sym("+/").kind, SymKind::Raw);
        assert_eq!(sym("+/").name.as_str(), "+/");
        assert_eq!(sym(r"min\").kind, SymKind::Raw);
        assert_eq!(sym("a/b/").kind, SymKind::Raw);
    }

    #[test]
    fn test_bare_sigils_are_raw_words() {
        for word in ["!", "-", "?", ":", ".", "@", "%", "#", "'"] {
            assert_eq!(sym(word).kind, SymKind::Raw, "sigil {:?}", word);
            assert_eq!(sym(word).name.as_str(), word);
        }
    }

    #[test]
    fn test_whitespace_is_counted() {
        match scan_token("   42") {
            Scan::Token(RawToken::Int(42), consumed) => assert_eq!(consumed, 5),
            other => panic!("{:?}", other),
        }
        assert_eq!(scan_token("   "), Scan::Exhausted(3));
    }
}
