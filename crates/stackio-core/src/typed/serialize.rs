//! Serializer and parser seams.
//!
//! A serializer renders a typed value onto a stream; a parser is the
//! inverse. Both can be looked up from the format registry by name or
//! supplied directly by the caller. A serializer also answers an
//! identity query — its format name and whether its output is UTF-8 —
//! without performing any I/O.

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::core::Stream;
use crate::typed::descriptor::Descriptor;
use crate::typed::value::Value;

/// What a serializer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatIdentity {
    pub name: &'static str,
    pub utf8: bool,
}

/// Renders values of a described type onto a stream.
pub trait ValueSerializer {
    /// Format name and text-ness, with no I/O.
    fn identity(&self) -> FormatIdentity;

    /// Emit `value` (shaped per `desc`) to `out`, propagating the first
    /// stream error.
    fn serialize(&self, out: &Stream, value: &Value, desc: &Descriptor) -> Result<()>;
}

/// Reconstructs values of a described type from a stream.
pub trait ValueParser {
    /// Format name, with no I/O.
    fn identity(&self) -> FormatIdentity;

    /// Consume bytes from `input` and build a value shaped per `desc`.
    fn parse(&self, input: &Stream, desc: &Descriptor) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// Default (UTF-8 text) serializer
// ---------------------------------------------------------------------------

/// The default serializer: plain UTF-8 text rendering. Containers come
/// out bracketed, strings unquoted, binary as lowercase hex.
pub struct Utf8Format;

impl ValueSerializer for Utf8Format {
    fn identity(&self) -> FormatIdentity {
        FormatIdentity {
            name: "UTF8",
            utf8: true,
        }
    }

    fn serialize(&self, out: &Stream, value: &Value, desc: &Descriptor) -> Result<()> {
        // A per-type serializer override wins over the generic walk.
        if let Some(f) = desc.ops().serialize {
            return f(out, value, desc);
        }
        if !desc.admits(value) {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "value does not match its descriptor",
            ));
        }
        write_utf8(out, value, desc)
    }
}

fn write_utf8(out: &Stream, value: &Value, desc: &Descriptor) -> Result<()> {
    match value {
        Value::Null => out.puts("null"),
        Value::Bool(true) => out.puts("true"),
        Value::Bool(false) => out.puts("false"),
        Value::Int(i) => out.puts(&i.to_string()),
        Value::UInt(u) => out.puts(&u.to_string()),
        Value::Float(f) => out.puts(&format_float(*f)),
        Value::Str(s) => out.puts(s),
        Value::Binary(b) => {
            for byte in b {
                let pair = [hex_digit(byte >> 4), hex_digit(byte & 0x0f)];
                out.write_all(&pair)?;
            }
            Ok(())
        }
        Value::List(items) => {
            let child = child_or_variant(desc, false);
            out.putc(b'[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.putc(b',')?;
                }
                write_utf8(out, item, &child)?;
            }
            out.putc(b']')
        }
        Value::Map(pairs) => {
            let key_child = child_or_variant(desc, true);
            let val_child = child_or_variant(desc, false);
            out.putc(b'{')?;
            for (i, (k, v)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.putc(b',')?;
                }
                write_utf8(out, k, &key_child)?;
                out.putc(b'=')?;
                write_utf8(out, v, &val_child)?;
            }
            out.putc(b'}')
        }
    }
}

/// Child descriptor for recursion; leaf descriptors over container
/// values (the `variant` case) recurse with the variant leaf itself.
pub(crate) fn child_or_variant(
    desc: &Descriptor,
    key_side: bool,
) -> std::sync::Arc<Descriptor> {
    let child = if key_side {
        desc.key_child()
    } else {
        desc.value_child()
    };
    match child {
        Some(c) => c.clone(),
        None => Descriptor::variant(),
    }
}

pub(crate) fn hex_digit(nibble: u8) -> u8 {
    b"0123456789abcdef"[(nibble & 0x0f) as usize]
}

/// Render a float the way the text formats expect: integral values keep
/// one trailing zero, non-finite values become null.
pub(crate) fn format_float(f: f64) -> String {
    if !f.is_finite() {
        return "null".to_owned();
    }
    if f == f.trunc() && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}
