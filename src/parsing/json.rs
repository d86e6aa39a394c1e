//! # JSON Parsing and Canonical Serialization
//!
//! Records cross the block codec as JSON text, so this module owns both
//! directions:
//!
//! 1. **Parsing**: `parse_json` turns a block payload back into a
//!    [`JsonValue`] tree.
//! 2. **Serialization**: `write_json` renders the canonical compact form —
//!    no whitespace, object fields in insertion order — which is the exact
//!    byte sequence whose length drives block-size decisions.
//!
//! The parser is a single-pass recursive descent over the input bytes. All
//! errors carry the byte position that failed.
//!
//! Numbers are stored as `f64`. On output, values without a fractional part
//! render as integers (`1`, not `1.0`), matching the canonical form a
//! dynamically-typed producer would have written.

use std::fmt;

use eyre::{bail, Result};

use crate::types::JsonValue;

/// Parses one JSON value from `input`. Trailing non-whitespace is an error.
pub fn parse_json(input: &str) -> Result<JsonValue> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos != parser.bytes.len() {
        bail!("trailing characters at byte {}", parser.pos);
    }
    Ok(value)
}

/// Renders the canonical compact JSON string for `value`.
pub fn to_json_string(value: &JsonValue) -> String {
    value.to_string()
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            bail!(
                "expected '{}' at byte {}",
                char::from(byte),
                self.pos
            );
        }
    }

    fn eat_literal(&mut self, literal: &str) -> bool {
        if self.bytes[self.pos..].starts_with(literal.as_bytes()) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn parse_value(&mut self) -> Result<JsonValue> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => Ok(JsonValue::String(self.parse_string()?)),
            Some(b't' | b'f' | b'n') => self.parse_keyword(),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) => bail!("unexpected character '{}' at byte {}", char::from(c), self.pos),
            None => bail!("unexpected end of input at byte {}", self.pos),
        }
    }

    fn parse_keyword(&mut self) -> Result<JsonValue> {
        if self.eat_literal("true") {
            Ok(JsonValue::Bool(true))
        } else if self.eat_literal("false") {
            Ok(JsonValue::Bool(false))
        } else if self.eat_literal("null") {
            Ok(JsonValue::Null)
        } else {
            bail!("unexpected token at byte {}", self.pos)
        }
    }

    fn parse_object(&mut self) -> Result<JsonValue> {
        self.expect(b'{')?;
        let mut pairs = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(JsonValue::Object(pairs));
        }
        loop {
            self.skip_whitespace();
            let key = self.parse_string()?;
            self.skip_whitespace();
            self.expect(b':')?;
            let value = self.parse_value()?;
            pairs.push((key, value));
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(JsonValue::Object(pairs));
                }
                _ => bail!("expected ',' or '}}' at byte {}", self.pos),
            }
        }
    }

    fn parse_array(&mut self) -> Result<JsonValue> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(JsonValue::Array(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(JsonValue::Array(items));
                }
                _ => bail!("expected ',' or ']' at byte {}", self.pos),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.parse_escape(&mut out)?;
                }
                Some(_) => {
                    // Consume one UTF-8 scalar; the input is a &str so the
                    // boundary math cannot fail.
                    let start = self.pos;
                    let mut end = start + 1;
                    while end < self.bytes.len() && (self.bytes[end] & 0xC0) == 0x80 {
                        end += 1;
                    }
                    out.push_str(std::str::from_utf8(&self.bytes[start..end])?);
                    self.pos = end;
                }
                None => bail!("unterminated string at byte {}", self.pos),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<()> {
        let Some(c) = self.peek() else {
            bail!("unterminated escape at byte {}", self.pos);
        };
        self.pos += 1;
        match c {
            b'"' => out.push('"'),
            b'\\' => out.push('\\'),
            b'/' => out.push('/'),
            b'b' => out.push('\u{0008}'),
            b'f' => out.push('\u{000C}'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'u' => {
                let high = self.parse_hex4()?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    // Surrogate pair: a second \uXXXX must follow.
                    if !self.eat_literal("\\u") {
                        bail!("unpaired surrogate at byte {}", self.pos);
                    }
                    let low = self.parse_hex4()?;
                    if !(0xDC00..0xE000).contains(&low) {
                        bail!("invalid low surrogate at byte {}", self.pos);
                    }
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                match char::from_u32(code) {
                    Some(ch) => out.push(ch),
                    None => bail!("invalid unicode escape at byte {}", self.pos),
                }
            }
            _ => bail!("invalid escape '\\{}' at byte {}", char::from(c), self.pos),
        }
        Ok(())
    }

    fn parse_hex4(&mut self) -> Result<u32> {
        if self.pos + 4 > self.bytes.len() {
            bail!("truncated unicode escape at byte {}", self.pos);
        }
        let hex = std::str::from_utf8(&self.bytes[self.pos..self.pos + 4])?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| eyre::eyre!("invalid unicode escape at byte {}", self.pos))?;
        self.pos += 4;
        Ok(code)
    }

    fn parse_number(&mut self) -> Result<JsonValue> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(
            self.peek(),
            Some(b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-')
        ) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])?;
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(JsonValue::Number(n)),
            _ => bail!("invalid number '{}' at byte {}", text, start),
        }
    }
}

/// Writes the canonical compact form of `value` into `f`. This is the
/// single serialization path; [`JsonValue`]'s `Display` delegates here.
pub fn write_json(value: &JsonValue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        JsonValue::Null => f.write_str("null"),
        JsonValue::Bool(true) => f.write_str("true"),
        JsonValue::Bool(false) => f.write_str("false"),
        JsonValue::Number(n) => write!(f, "{}", n),
        JsonValue::String(s) => write_escaped(s, f),
        JsonValue::Array(items) => {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write_json(item, f)?;
            }
            f.write_str("]")
        }
        JsonValue::Object(pairs) => {
            f.write_str("{")?;
            for (i, (key, val)) in pairs.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write_escaped(key, f)?;
                f.write_str(":")?;
                write_json(val, f)?;
            }
            f.write_str("}")
        }
    }
}

fn write_escaped(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{0008}' => f.write_str("\\b")?,
            '\u{000C}' => f.write_str("\\f")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::deep_eq;

    #[test]
    fn parses_scalars() {
        assert_eq!(parse_json("null").unwrap(), JsonValue::Null);
        assert_eq!(parse_json("true").unwrap(), JsonValue::Bool(true));
        assert_eq!(parse_json("-2.5e2").unwrap(), JsonValue::Number(-250.0));
        assert_eq!(
            parse_json("\"a\\nb\"").unwrap(),
            JsonValue::String("a\nb".into())
        );
    }

    #[test]
    fn parses_nested_structures() {
        let value = parse_json(r#"{"a":[1,{"b":null}],"c":"x"}"#).unwrap();
        assert_eq!(
            value.get("a").and_then(|a| a.as_array()).map(|a| a.len()),
            Some(2)
        );
        assert_eq!(value.get("c").and_then(JsonValue::as_str), Some("x"));
    }

    #[test]
    fn canonical_form_round_trips() {
        let text = r#"{"_id":"7","name":"sam","tags":["a","b"],"n":3}"#;
        let value = parse_json(text).unwrap();
        assert_eq!(to_json_string(&value), text);
        assert!(deep_eq(&parse_json(&to_json_string(&value)).unwrap(), &value));
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(to_json_string(&JsonValue::Number(42.0)), "42");
        assert_eq!(to_json_string(&JsonValue::Number(1.5)), "1.5");
    }

    #[test]
    fn unicode_escapes_and_surrogate_pairs() {
        assert_eq!(
            parse_json("\"\\u0041\\ud83d\\ude00\"").unwrap(),
            JsonValue::String("A\u{1F600}".into())
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_json("{\"a\":}").is_err());
        assert!(parse_json("[1,2").is_err());
        assert!(parse_json("\"open").is_err());
        assert!(parse_json("{} trailing").is_err());
    }

    #[test]
    fn control_characters_escape_on_output() {
        let s = JsonValue::String("a\u{0001}b".into());
        assert_eq!(to_json_string(&s), "\"a\\u0001b\"");
    }
}
