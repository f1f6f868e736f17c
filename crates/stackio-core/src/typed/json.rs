//! JSON serializer and parser (RFC 8259).
//!
//! Both consume and produce stream bytes one at a time, so they can sit
//! at the top of any filter chain. The serializer emits UTF-8 by
//! default; the ASCII profile escapes every non-ASCII code point.
//! Objects keep the underlying map's insertion order. The parser is a
//! recursive-descent reader with a fixed depth cap.

use crate::error::{ErrorKind, Result, StreamError};
use crate::strbuf::StrBuf;
use crate::stream::core::Stream;
use crate::typed::descriptor::Descriptor;
use crate::typed::serialize::{
    FormatIdentity, ValueParser, ValueSerializer, format_float, hex_digit,
};
use crate::typed::value::Value;

/// Maximum nesting depth accepted by the parser.
const MAX_DEPTH: usize = 128;

/// Canonical JSON serializer (UTF-8).
pub struct JsonFormat;

/// JSON serializer escaping every non-ASCII code point.
pub struct JsonAsciiFormat;

/// Canonical JSON parser.
pub struct JsonParser;

impl ValueSerializer for JsonFormat {
    fn identity(&self) -> FormatIdentity {
        FormatIdentity {
            name: "JSON",
            utf8: true,
        }
    }

    fn serialize(&self, out: &Stream, value: &Value, desc: &Descriptor) -> Result<()> {
        check_shape(value, desc)?;
        write_json(out, value, false)
    }
}

impl ValueSerializer for JsonAsciiFormat {
    fn identity(&self) -> FormatIdentity {
        FormatIdentity {
            name: "JSON-ASCII",
            utf8: true,
        }
    }

    fn serialize(&self, out: &Stream, value: &Value, desc: &Descriptor) -> Result<()> {
        check_shape(value, desc)?;
        write_json(out, value, true)
    }
}

fn check_shape(value: &Value, desc: &Descriptor) -> Result<()> {
    if desc.admits(value) {
        Ok(())
    } else {
        Err(StreamError::new(
            ErrorKind::InvalidArgument,
            "value does not match its descriptor",
        ))
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

fn write_json(out: &Stream, value: &Value, ascii: bool) -> Result<()> {
    match value {
        Value::Null => out.puts("null"),
        Value::Bool(true) => out.puts("true"),
        Value::Bool(false) => out.puts("false"),
        Value::Int(i) => out.puts(&i.to_string()),
        Value::UInt(u) => out.puts(&u.to_string()),
        Value::Float(f) => out.puts(&format_float(*f)),
        Value::Str(s) => write_string(out, s, ascii),
        Value::Binary(b) => write_binary(out, b),
        Value::List(items) => {
            out.putc(b'[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.putc(b',')?;
                }
                write_json(out, item, ascii)?;
            }
            out.putc(b']')
        }
        Value::Map(pairs) => {
            out.putc(b'{')?;
            for (i, (k, v)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.putc(b',')?;
                }
                match k {
                    Value::Str(s) => write_string(out, s, ascii)?,
                    other => {
                        // Non-string keys render through their text form.
                        let text = Stream::dynamic_buffer("wb")?;
                        write_json(&text, other, ascii)?;
                        let bytes = text.contents()?;
                        write_string(out, &String::from_utf8_lossy(&bytes), ascii)?;
                    }
                }
                out.putc(b':')?;
                write_json(out, v, ascii)?;
            }
            out.putc(b'}')
        }
    }
}

fn write_escape_u16(out: &Stream, unit: u16) -> Result<()> {
    let mut esc = [b'\\', b'u', 0, 0, 0, 0];
    esc[2] = hex_digit((unit >> 12) as u8);
    esc[3] = hex_digit((unit >> 8) as u8);
    esc[4] = hex_digit((unit >> 4) as u8);
    esc[5] = hex_digit(unit as u8);
    out.write_all(&esc)
}

fn write_string(out: &Stream, s: &str, ascii: bool) -> Result<()> {
    out.putc(b'"')?;
    for ch in s.chars() {
        match ch {
            '"' => out.write_all(b"\\\"")?,
            '\\' => out.write_all(b"\\\\")?,
            '\n' => out.write_all(b"\\n")?,
            '\r' => out.write_all(b"\\r")?,
            '\t' => out.write_all(b"\\t")?,
            '\u{8}' => out.write_all(b"\\b")?,
            '\u{c}' => out.write_all(b"\\f")?,
            c if (c as u32) < 0x20 => write_escape_u16(out, c as u16)?,
            c if !ascii || c.is_ascii() => {
                let mut utf8 = [0u8; 4];
                out.write_all(c.encode_utf8(&mut utf8).as_bytes())?;
            }
            c => {
                // ASCII profile: escape through UTF-16 units, with a
                // surrogate pair above the BMP.
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write_escape_u16(out, *unit)?;
                }
            }
        }
    }
    out.putc(b'"')
}

/// Binary blobs become strings; bytes outside printable ASCII are
/// escaped as `\u00xx` so the output stays valid JSON.
fn write_binary(out: &Stream, bytes: &[u8]) -> Result<()> {
    out.putc(b'"')?;
    for &b in bytes {
        match b {
            b'"' => out.write_all(b"\\\"")?,
            b'\\' => out.write_all(b"\\\\")?,
            0x20..=0x7e => out.putc(b)?,
            _ => write_escape_u16(out, b as u16)?,
        }
    }
    out.putc(b'"')
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

impl ValueParser for JsonParser {
    fn identity(&self) -> FormatIdentity {
        FormatIdentity {
            name: "JSON",
            utf8: true,
        }
    }

    fn parse(&self, input: &Stream, desc: &Descriptor) -> Result<Value> {
        let value = parse_value(input, 0)?;
        if !desc.admits(&value) {
            return Err(StreamError::new(
                ErrorKind::BadMessage,
                "parsed value does not match the requested type",
            ));
        }
        Ok(value)
    }
}

fn bad(context: &'static str) -> StreamError {
    StreamError::new(ErrorKind::BadMessage, context)
}

fn skip_ws(input: &Stream) -> Result<Option<u8>> {
    loop {
        match input.getc()? {
            Some(b) if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' => continue,
            other => return Ok(other),
        }
    }
}

fn expect_literal(input: &Stream, rest: &[u8]) -> Result<()> {
    for &expect in rest {
        match input.getc()? {
            Some(b) if b == expect => {}
            _ => return Err(bad("malformed literal")),
        }
    }
    Ok(())
}

fn parse_value(input: &Stream, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(bad("nesting too deep"));
    }
    let first = skip_ws(input)?.ok_or_else(|| bad("unexpected end of input"))?;
    match first {
        b'n' => {
            expect_literal(input, b"ull")?;
            Ok(Value::Null)
        }
        b't' => {
            expect_literal(input, b"rue")?;
            Ok(Value::Bool(true))
        }
        b'f' => {
            expect_literal(input, b"alse")?;
            Ok(Value::Bool(false))
        }
        b'"' => parse_string(input).map(Value::Str),
        b'[' => parse_array(input, depth),
        b'{' => parse_object(input, depth),
        b'-' | b'0'..=b'9' => parse_number(input, first),
        _ => Err(bad("unexpected byte")),
    }
}

fn parse_array(input: &Stream, depth: usize) -> Result<Value> {
    let mut items = Vec::new();
    match skip_ws(input)? {
        Some(b']') => return Ok(Value::List(items)),
        Some(b) => input.ungetc(b)?,
        None => return Err(bad("unterminated array")),
    }
    loop {
        items.push(parse_value(input, depth + 1)?);
        match skip_ws(input)? {
            Some(b',') => continue,
            Some(b']') => return Ok(Value::List(items)),
            _ => return Err(bad("expected ',' or ']'")),
        }
    }
}

fn parse_object(input: &Stream, depth: usize) -> Result<Value> {
    let mut pairs = Vec::new();
    match skip_ws(input)? {
        Some(b'}') => return Ok(Value::Map(pairs)),
        Some(b) => input.ungetc(b)?,
        None => return Err(bad("unterminated object")),
    }
    loop {
        match skip_ws(input)? {
            Some(b'"') => {}
            _ => return Err(bad("object key must be a string")),
        }
        let key = parse_string(input)?;
        match skip_ws(input)? {
            Some(b':') => {}
            _ => return Err(bad("expected ':' after key")),
        }
        let value = parse_value(input, depth + 1)?;
        pairs.push((Value::Str(key), value));
        match skip_ws(input)? {
            Some(b',') => continue,
            Some(b'}') => return Ok(Value::Map(pairs)),
            _ => return Err(bad("expected ',' or '}'")),
        }
    }
}

fn hex_nibble(b: u8) -> Result<u16> {
    match b {
        b'0'..=b'9' => Ok((b - b'0') as u16),
        b'a'..=b'f' => Ok((b - b'a' + 10) as u16),
        b'A'..=b'F' => Ok((b - b'A' + 10) as u16),
        _ => Err(bad("malformed \\u escape")),
    }
}

fn parse_u16_escape(input: &Stream) -> Result<u16> {
    let mut unit = 0u16;
    for _ in 0..4 {
        let b = input.getc()?.ok_or_else(|| bad("truncated \\u escape"))?;
        unit = (unit << 4) | hex_nibble(b)?;
    }
    Ok(unit)
}

/// Parse a string body; the opening quote has been consumed.
fn parse_string(input: &Stream) -> Result<String> {
    let mut buf = StrBuf::new();
    loop {
        let b = input.getc()?.ok_or_else(|| bad("unterminated string"))?;
        match b {
            b'"' => return Ok(buf.take_string()),
            b'\\' => {
                let esc = input.getc()?.ok_or_else(|| bad("truncated escape"))?;
                match esc {
                    b'"' => buf.push(b'"'),
                    b'\\' => buf.push(b'\\'),
                    b'/' => buf.push(b'/'),
                    b'n' => buf.push(b'\n'),
                    b'r' => buf.push(b'\r'),
                    b't' => buf.push(b'\t'),
                    b'b' => buf.push(0x08),
                    b'f' => buf.push(0x0c),
                    b'u' => {
                        let unit = parse_u16_escape(input)?;
                        let ch = if (0xd800..0xdc00).contains(&unit) {
                            // High surrogate; a low surrogate must follow.
                            match (input.getc()?, input.getc()?) {
                                (Some(b'\\'), Some(b'u')) => {}
                                _ => return Err(bad("unpaired surrogate")),
                            }
                            let low = parse_u16_escape(input)?;
                            if !(0xdc00..0xe000).contains(&low) {
                                return Err(bad("unpaired surrogate"));
                            }
                            let combined = 0x10000
                                + (((unit - 0xd800) as u32) << 10)
                                + (low - 0xdc00) as u32;
                            char::from_u32(combined).ok_or_else(|| bad("invalid code point"))?
                        } else if (0xdc00..0xe000).contains(&unit) {
                            return Err(bad("unpaired surrogate"));
                        } else {
                            char::from_u32(unit as u32).ok_or_else(|| bad("invalid code point"))?
                        };
                        let mut utf8 = [0u8; 4];
                        buf.push_str(ch.encode_utf8(&mut utf8));
                    }
                    _ => return Err(bad("unknown escape")),
                }
            }
            _ => buf.push(b),
        }
    }
}

fn parse_number(input: &Stream, first: u8) -> Result<Value> {
    let mut buf = StrBuf::new();
    buf.push(first);
    let mut is_float = false;
    loop {
        match input.getc()? {
            Some(b) => match b {
                b'0'..=b'9' | b'-' | b'+' => buf.push(b),
                b'.' | b'e' | b'E' => {
                    is_float = true;
                    buf.push(b);
                }
                _ => {
                    input.ungetc(b)?;
                    break;
                }
            },
            None => break,
        }
    }
    let text = buf.take_string();
    if !is_float {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        if let Ok(u) = text.parse::<u64>() {
            return Ok(Value::UInt(u));
        }
    }
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| bad("malformed number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::descriptor::Descriptor;

    fn to_json(value: &Value) -> String {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        JsonFormat
            .serialize(&sink, value, &Descriptor::variant())
            .unwrap();
        String::from_utf8(sink.contents().unwrap()).unwrap()
    }

    fn from_json(text: &str) -> Result<Value> {
        let src = Stream::cstring(text.as_bytes());
        JsonParser.parse(&src, &Descriptor::variant())
    }

    #[test]
    fn test_map_serializes_in_insertion_order() {
        let inner = Value::list(vec![Value::Bool(true), Value::Null, Value::str("x")]);
        let mut m = Value::map();
        m.map_insert("a".into(), Value::Int(1));
        m.map_insert("b".into(), inner);
        assert_eq!(to_json(&m), r#"{"a":1,"b":[true,null,"x"]}"#);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            to_json(&Value::str("a\"b\\c\nd\te")),
            r#""a\"b\\c\nd\te""#
        );
        assert_eq!(to_json(&Value::str("\u{1}")), "\"\\u0001\"");
    }

    #[test]
    fn test_ascii_profile_escapes_non_ascii() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        JsonAsciiFormat
            .serialize(&sink, &Value::str("héllo \u{1f600}"), &Descriptor::variant())
            .unwrap();
        let text = String::from_utf8(sink.contents().unwrap()).unwrap();
        assert_eq!(text, "\"h\\u00e9llo \\ud83d\\ude00\"");
    }

    #[test]
    fn test_utf8_default_keeps_non_ascii() {
        assert_eq!(to_json(&Value::str("héllo")), "\"héllo\"");
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(from_json("null").unwrap(), Value::Null);
        assert_eq!(from_json("true").unwrap(), Value::Bool(true));
        assert_eq!(from_json("-42").unwrap(), Value::Int(-42));
        assert_eq!(
            from_json("18446744073709551615").unwrap(),
            Value::UInt(u64::MAX)
        );
        assert_eq!(from_json("1.5").unwrap(), Value::Float(1.5));
        assert_eq!(from_json("\"hi\"").unwrap(), Value::str("hi"));
    }

    #[test]
    fn test_parse_nested() {
        let v = from_json(r#" { "a" : [1, 2, {"b": false}], "c": null } "#).unwrap();
        let a = v.map_get(&"a".into()).unwrap();
        assert_eq!(a.list_get(0), Some(&Value::Int(1)));
        let obj = a.list_get(2).unwrap();
        assert_eq!(obj.map_get(&"b".into()), Some(&Value::Bool(false)));
        assert_eq!(v.map_get(&"c".into()), Some(&Value::Null));
    }

    #[test]
    fn test_parse_unicode_escapes() {
        assert_eq!(from_json(r#""é""#).unwrap(), Value::str("é"));
        assert_eq!(
            from_json(r#""😀""#).unwrap(),
            Value::str("\u{1f600}")
        );
        assert!(from_json(r#""\ud83d""#).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(from_json("{").is_err());
        assert!(from_json("[1,]").is_err());
        assert!(from_json("tru").is_err());
        assert!(from_json("{'a':1}").is_err());
    }

    #[test]
    fn test_roundtrip_through_stream() {
        let mut m = Value::map();
        m.map_insert("nums".into(), Value::list(vec![Value::Int(1), Value::Int(2)]));
        m.map_insert("name".into(), Value::str("round trip"));
        let text = to_json(&m);
        let back = from_json(&text).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_depth_cap() {
        let deep = "[".repeat(200) + &"]".repeat(200);
        assert!(from_json(&deep).is_err());
    }

    #[test]
    fn test_binary_renders_as_escaped_string() {
        let v = Value::Binary(vec![0x41, 0x00, 0xff]);
        assert_eq!(to_json(&v), "\"A\\u0000\\u00ff\"");
    }
}
