//! Serialization: values back to source-ish text, and the XML encoding.

use impi_lex::value::{HostFn, Value};

/// Render a value as source-ish text.
///
/// Strings come back quoted and escaped, symbols with their sigils
/// restored, lists with their original delimiters. `show` of a parsed
/// tree re-parses to a structurally equal tree (modulo separator
/// normalization).
pub fn show(value: &Value) -> String {
    match value {
        Value::Top(items) => join(items),
        Value::Lst(lst) => format!("{}{}{}", lst.open.as_str(), join(&lst.items), lst.close),
        Value::Sep(kind) => kind.as_str().to_string(),
        Value::Int(n) => n.to_string(),
        Value::Num(n) => show_num(*n),
        Value::Str(s) => quote_str(s),
        Value::Mls(s) => format!("```{}```", s),
        Value::Sym(sym) => sym.spelling(),
        Value::Ints(v) => v
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Nums(v) => v
            .iter()
            .map(|n| show_num(*n))
            .collect::<Vec<_>>()
            .join(" "),
        Value::Syms(v) => v
            .iter()
            .map(|s| s.spelling())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Nil => "nil".to_string(),
        Value::Err(message) => format!("?{}", message),
        Value::End => String::new(),
        Value::Jsf(f) => {
            let base = match &f.host {
                HostFn::Prim(name) => name.as_str().to_string(),
                HostFn::Fold(op) => format!("{}/", show(op)),
                HostFn::Scan(op) => format!("{}\\", show(op)),
                HostFn::Compose(outer, inner) => format!("{} {}", show(outer), show(inner)),
                HostFn::Closure(ifn) => show(ifn),
            };
            if f.captured.is_empty() {
                base
            } else {
                let captured: Vec<String> = f.captured.iter().map(show).collect();
                format!("{}[{}]", base, captured.join("; "))
            }
        }
        Value::Ifn(f) => format!("{{{}}}", join(&f.body)),
        Value::Dct(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("`{} {}", k.as_str(), show(v)))
                .collect();
            format!(":[{}]", entries.join("; "))
        }
    }
}

/// The text `echo` prints: strings raw, everything else via [`show`].
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Str(s) | Value::Mls(s) => s.clone(),
        other => show(other),
    }
}

fn join(items: &[Value]) -> String {
    items.iter().map(show).collect::<Vec<_>>().join(" ")
}

/// Floats print like integers when they are integral (`1`, not `1.0`),
/// which keeps strand output aligned with INT output.
fn show_num(n: f64) -> String {
    if n == f64::INFINITY {
        "inf".to_string()
    } else if n == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        n.to_string()
    }
}

/// JSON-style escaping inside double quotes.
fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// XML encoding with the `imp:` namespace.
///
/// Strand vectors serialize element-wise, so `1 2` and the strand
/// `INTs(1 2)` encode identically; LST nodes keep their opener and
/// closer as attributes and their members (separators included) as
/// children.
pub fn xmls(value: &Value) -> String {
    let mut out = String::new();
    xml_value(value, &mut out);
    out
}

fn xml_value(value: &Value, out: &mut String) {
    match value {
        Value::Top(items) => {
            out.push_str("<imp:top>");
            items.iter().for_each(|item| xml_value(item, out));
            out.push_str("</imp:top>");
        }
        Value::Lst(lst) => {
            out.push_str(&format!(
                "<imp:lst open=\"{}\" close=\"{}\">",
                xml_escape(lst.open.as_str()),
                lst.close
            ));
            lst.items.iter().for_each(|item| xml_value(item, out));
            out.push_str("</imp:lst>");
        }
        Value::Sep(kind) => leaf(out, "sep", kind.as_str()),
        Value::Int(n) => leaf(out, "int", &n.to_string()),
        Value::Num(n) => leaf(out, "num", &show_num(*n)),
        Value::Str(s) => leaf(out, "str", s),
        Value::Mls(s) => leaf(out, "mls", s),
        Value::Sym(sym) => leaf(out, "sym", &sym.spelling()),
        Value::Ints(v) => v.iter().for_each(|n| leaf(out, "int", &n.to_string())),
        Value::Nums(v) => v.iter().for_each(|n| leaf(out, "num", &show_num(*n))),
        Value::Syms(v) => v.iter().for_each(|s| leaf(out, "sym", &s.spelling())),
        Value::Nil => out.push_str("<imp:nil/>"),
        Value::Err(message) => leaf(out, "err", message),
        Value::End => out.push_str("<imp:end/>"),
        Value::Jsf(_) | Value::Ifn(_) => leaf(out, "fn", &show(value)),
        Value::Dct(map) => {
            out.push_str("<imp:dct>");
            for (k, v) in map {
                leaf(out, "sym", &format!("`{}", k.as_str()));
                xml_value(v, out);
            }
            out.push_str("</imp:dct>");
        }
    }
}

fn leaf(out: &mut String, tag: &str, text: &str) {
    out.push_str(&format!("<imp:{} v=\"{}\"/>", tag, xml_escape(text)));
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}
