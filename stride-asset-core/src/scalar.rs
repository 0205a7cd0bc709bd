//! Scalar/value codec
//!
//! Converts between the textual scalar forms found in Stride documents and
//! typed [`Value`]s. Formatting is culture invariant and float tokens always
//! carry a decimal point so that the editor and Stride read them back as
//! floating point numbers.

use crate::constants::NULL_LITERAL;
use crate::reference::{AssetRef, EntityRef};
use crate::value::Value;
use indexmap::IndexMap;

// 2^53, the largest magnitude below which every integer is exact in an f64
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Format a float so that it always contains a decimal point.
///
/// The shortest representation that round-trips is used, written without
/// exponent: `0.0`, `1.0`, `-0.00000004371139`, `100.0`.
pub fn format_float(value: f64) -> String {
    if value == 0.0 {
        return "0.0".to_string();
    }
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// Format a typed value as a scalar token (or flow collection for maps and
/// arrays)
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => NULL_LITERAL.to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::String(s) => format_string(s),
        Value::EntityRef(r) => r.to_string(),
        Value::AssetRef(r) => r.to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// Format a string scalar, quoting it only when a plain token would be read
/// back as something else
pub fn format_string(s: &str) -> String {
    if needs_quoting(s) {
        format!("'{}'", s.replace('\'', "''"))
    } else {
        s.to_string()
    }
}

/// Check if a string needs quoting
fn needs_quoting(s: &str) -> bool {
    if s.is_empty() || s.starts_with(' ') || s.ends_with(' ') {
        return true;
    }
    if s.contains('\n') || s.contains('\r') || s.contains(": ") || s.contains(" #") {
        return true;
    }
    if s.ends_with(':') {
        return true;
    }
    // Plain tokens that would be read back as references
    if AssetRef::parse(s).is_some() || EntityRef::parse(s).is_some() {
        return true;
    }
    let first = s.chars().next().unwrap_or(' ');
    if matches!(
        first,
        '{' | '[' | '!' | '&' | '*' | '\'' | '"' | '%' | '@' | '`' | '#' | '|' | '>' | '-' | '?'
    ) && !(first == '-' && looks_numeric(s))
    {
        return true;
    }
    // Plain tokens that would be read back as bool, null or number
    s.eq_ignore_ascii_case("true")
        || s.eq_ignore_ascii_case("false")
        || s == NULL_LITERAL
        || s == "~"
        || looks_numeric(s)
}

fn looks_numeric(s: &str) -> bool {
    is_integer_token(s) || parse_float_token(s).is_some()
}

fn is_integer_token(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_float_token(s: &str) -> Option<f64> {
    // Only the spellings format_float writes; Rust alone would also take "inf"
    match s {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }
    let first = s.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '-' | '+' | '.')) {
        return None;
    }
    if s.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E') {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Remove surrounding single or double quotes from a scalar token
pub fn unquote(token: &str) -> Option<String> {
    let t = token.trim();
    if t.len() >= 2 && t.starts_with('\'') && t.ends_with('\'') {
        return Some(t[1..t.len() - 1].replace("''", "'"));
    }
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        let inner = &t[1..t.len() - 1];
        return Some(
            inner
                .replace("\\\"", "\"")
                .replace("\\n", "\n")
                .replace("\\t", "\t")
                .replace("\\\\", "\\"),
        );
    }
    None
}

/// Interpret a scalar token.
///
/// The order matters: flow maps, then asset references (the part before the
/// first colon parses as a GUID), then entity references, booleans, floats,
/// integers and finally plain strings. A token such as `12345:SomePath`
/// stays a string because its left side is not a GUID, and `100` reads as
/// `Float(100.0)`. Integer-shaped tokens beyond the exact range of `f64`
/// stay integers so large ids keep every digit.
pub fn parse_scalar(text: &str) -> Value {
    let token = text.trim();

    if token.starts_with('{') && token.ends_with('}') {
        return Value::Object(parse_flow_map(token));
    }
    if token.starts_with('[') && token.ends_with(']') {
        return Value::Array(
            split_flow_items(&token[1..token.len() - 1])
                .into_iter()
                .map(parse_scalar)
                .collect(),
        );
    }
    if let Some(s) = unquote(token) {
        return Value::String(s);
    }
    if let Some(asset) = AssetRef::parse(token) {
        return Value::AssetRef(asset);
    }
    if let Some(entity) = EntityRef::parse(token) {
        return Value::EntityRef(entity);
    }
    if token == NULL_LITERAL || token == "~" {
        return Value::Null;
    }
    if token.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if token.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    let integer = is_integer_token(token)
        .then(|| token.parse::<i64>().ok())
        .flatten();
    if let Some(f) = parse_float_token(token) {
        match integer {
            Some(i) if f.abs() > MAX_EXACT_FLOAT_INT => return Value::Integer(i),
            _ => return Value::Float(f),
        }
    }
    if let Some(i) = integer {
        return Value::Integer(i);
    }
    Value::String(token.to_string())
}

/// Split the inside of a flow collection on top-level commas
pub fn split_flow_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '{' | '[' => depth += 1,
                '}' | ']' => depth -= 1,
                ',' if depth == 0 => {
                    items.push(inner[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    let tail = inner[start..].trim();
    if !tail.is_empty() {
        items.push(tail);
    }
    items.retain(|s| !s.is_empty());
    items
}

/// Split a `{K: v, ...}` flow map into raw `(key, token)` pairs without
/// interpreting the values
pub fn split_flow_map(token: &str) -> Vec<(String, String)> {
    let t = token.trim();
    let inner = t
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(t);

    split_flow_items(inner)
        .into_iter()
        .filter_map(|segment| {
            segment
                .split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Parse a `{K: v, ...}` flow map into typed values
pub fn parse_flow_map(token: &str) -> IndexMap<String, Value> {
    split_flow_map(token)
        .into_iter()
        .map(|(k, v)| {
            let value = parse_scalar(&v);
            (k, value)
        })
        .collect()
}
