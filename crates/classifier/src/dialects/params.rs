//! Parameter-dump parsing for the request dialect.
//!
//! Request parameter lines dump a hash-shaped structure:
//! `{"key"=>"value", "nested"=>{"x"=>["a", "b"]}, :sym=>1, "flag"=>nil}`.
//! Best-effort: any syntax error makes the caller keep the raw text
//! instead.

use std::iter::Peekable;
use std::str::Chars;

use serde_json::{Map, Number, Value};

/// Parse a parameter dump into a JSON value tree.
///
/// `None` on any syntax error; the whole input must be consumed.
pub(crate) fn parse(input: &str) -> Option<Value> {
    let mut chars = input.chars().peekable();
    let value = parse_value(&mut chars)?;
    skip_ws(&mut chars);
    if chars.next().is_some() {
        return None;
    }
    Some(value)
}

fn parse_value(chars: &mut Peekable<Chars<'_>>) -> Option<Value> {
    skip_ws(chars);
    match chars.peek()? {
        '{' => parse_hash(chars),
        '[' => parse_array(chars),
        '"' => parse_string(chars).map(Value::String),
        ':' => parse_symbol(chars).map(Value::String),
        c if c.is_ascii_digit() || *c == '-' => parse_number(chars),
        _ => parse_word(chars),
    }
}

fn parse_hash(chars: &mut Peekable<Chars<'_>>) -> Option<Value> {
    expect(chars, '{')?;
    let mut map = Map::new();
    skip_ws(chars);
    if chars.peek() == Some(&'}') {
        chars.next();
        return Some(Value::Object(map));
    }
    loop {
        skip_ws(chars);
        let key = match chars.peek()? {
            '"' => parse_string(chars)?,
            ':' => parse_symbol(chars)?,
            _ => return None,
        };
        skip_ws(chars);
        expect(chars, '=')?;
        expect(chars, '>')?;
        let value = parse_value(chars)?;
        map.insert(key, value);
        skip_ws(chars);
        match chars.next()? {
            ',' => continue,
            '}' => return Some(Value::Object(map)),
            _ => return None,
        }
    }
}

fn parse_array(chars: &mut Peekable<Chars<'_>>) -> Option<Value> {
    expect(chars, '[')?;
    let mut items = Vec::new();
    skip_ws(chars);
    if chars.peek() == Some(&']') {
        chars.next();
        return Some(Value::Array(items));
    }
    loop {
        items.push(parse_value(chars)?);
        skip_ws(chars);
        match chars.next()? {
            ',' => continue,
            ']' => return Some(Value::Array(items)),
            _ => return None,
        }
    }
}

fn parse_string(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    expect(chars, '"')?;
    let mut out = String::new();
    let mut escaped = false;
    for c in chars.by_ref() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some(out);
        } else {
            out.push(c);
        }
    }
    // Unterminated string
    None
}

fn parse_symbol(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    expect(chars, ':')?;
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn parse_number(chars: &mut Peekable<Chars<'_>>) -> Option<Value> {
    let mut text = String::new();
    if chars.peek() == Some(&'-') {
        text.push('-');
        chars.next();
    }
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if text.contains('.') {
        let value: f64 = text.parse().ok()?;
        Number::from_f64(value).map(Value::Number)
    } else {
        text.parse::<i64>().ok().map(|n| Value::Number(n.into()))
    }
}

/// Bare words: `true`, `false`, `nil`.
fn parse_word(chars: &mut Peekable<Chars<'_>>) -> Option<Value> {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphabetic() {
            word.push(c);
            chars.next();
        } else {
            break;
        }
    }
    match word.as_str() {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "nil" => Some(Value::Null),
        _ => None,
    }
}

fn skip_ws(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().map_or(false, |c| c.is_whitespace()) {
        chars.next();
    }
}

fn expect(chars: &mut Peekable<Chars<'_>>, expected: char) -> Option<()> {
    (chars.next()? == expected).then_some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_hash() {
        let value = parse(r#"{"controller"=>"shipments", "action"=>"show"}"#).unwrap();
        assert_eq!(value, json!({"controller": "shipments", "action": "show"}));
    }

    #[test]
    fn test_nested_hash_and_array() {
        let value = parse(
            r#"{"shipment"=>{"weight"=>"2.5", "tags"=>["fragile", "express"]}, "id"=>"443155"}"#,
        )
        .unwrap();
        assert_eq!(
            value,
            json!({
                "shipment": {"weight": "2.5", "tags": ["fragile", "express"]},
                "id": "443155"
            })
        );
    }

    #[test]
    fn test_symbol_keys_and_scalars() {
        let value = parse(r#"{:page=>2, :per_page=>25.5, "active"=>true, "memo"=>nil}"#).unwrap();
        assert_eq!(
            value,
            json!({"page": 2, "per_page": 25.5, "active": true, "memo": null})
        );
    }

    #[test]
    fn test_escaped_quotes_in_strings() {
        let value = parse(r#"{"note"=>"say \"hi\""}"#).unwrap();
        assert_eq!(value, json!({"note": "say \"hi\""}));
    }

    #[test]
    fn test_empty_hash_and_array() {
        assert_eq!(parse("{}").unwrap(), json!({}));
        assert_eq!(parse(r#"{"xs"=>[]}"#).unwrap(), json!({"xs": []}));
    }

    #[test]
    fn test_negative_numbers() {
        let value = parse(r#"{"offset"=>-3}"#).unwrap();
        assert_eq!(value, json!({"offset": -3}));
    }

    #[test]
    fn test_syntax_errors_yield_none() {
        assert!(parse(r#"{"broken"=>"#).is_none());
        assert!(parse(r#"{"key"->"value"}"#).is_none());
        assert!(parse(r#"{"unterminated"=>"value}"#).is_none());
        assert!(parse("not a hash at all").is_none());
    }

    #[test]
    fn test_trailing_garbage_yields_none() {
        assert!(parse(r#"{"k"=>"v"} trailing"#).is_none());
    }
}
