//! Generic printf-style formatting over streams.
//!
//! The format string is parsed into a sequence of directives, then the
//! arguments are consumed by a typed walk — arity or type mismatches are
//! InvalidArgument, never silent. Beyond the familiar `%d %u %x %s %c`
//! subset, a `%{...}` extension serializes a typed value through the
//! descriptor and format registries:
//!
//! | form        | meaning                                   |
//! |-------------|-------------------------------------------|
//! | `type`      | registered type, default serializer       |
//! | `type[fmt]` | registered type, registered format        |
//! | `type[*]`   | format name from the arguments            |
//! | `type[?]`   | caller-supplied serializer                |
//! | `*`…        | type name from the arguments              |
//! | `?`…        | caller-supplied descriptor                |
//!
//! The scanning counterpart reads `%d %i %u %x %s %c` plus literal and
//! whitespace matching — the symmetric subset.

use crate::error::{ErrorKind, Result, StreamError};
use crate::strbuf::StrBuf;
use crate::stream::core::Stream;
use crate::typed::descriptor::DescRef;
use crate::typed::registry;
use crate::typed::serialize::{Utf8Format, ValueSerializer};
use crate::typed::value::Value;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// A formatting argument.
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(u8),
    Str(&'a str),
    /// Typed payload for a `%{...}` directive.
    Value(&'a Value),
    /// Caller-supplied descriptor for the `?` type part.
    Desc(&'a DescRef),
    /// Type or format name for a `*` part.
    Name(&'a str),
    /// Caller-supplied serializer for the `?` format part.
    Serializer(&'a dyn ValueSerializer),
}

// ---------------------------------------------------------------------------
// Parsed directives
// ---------------------------------------------------------------------------

/// Flags on a conversion directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatFlags {
    pub left_justify: bool,
    pub force_sign: bool,
    pub space_sign: bool,
    pub alt_form: bool,
    pub zero_pad: bool,
}

/// A parsed `%` conversion.
#[derive(Debug, Clone, Copy)]
pub struct ConvSpec {
    pub flags: FormatFlags,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub conversion: u8,
}

/// Where the descriptor for a brace directive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TypePart {
    Registered(String),
    FromArg,
    Provided,
}

/// Where the serializer for a brace directive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FormatPart {
    Default,
    Registered(String),
    FromArg,
    Provided,
}

/// One piece of a parsed format string.
enum Segment<'f> {
    Literal(&'f [u8]),
    Percent,
    Conv(ConvSpec),
    Brace { ty: TypePart, format: FormatPart },
}

fn invalid(context: &'static str) -> StreamError {
    StreamError::new(ErrorKind::InvalidArgument, context)
}

// ---------------------------------------------------------------------------
// Format-string parser
// ---------------------------------------------------------------------------

fn parse_segments(fmt: &str) -> Result<Vec<Segment<'_>>> {
    let bytes = fmt.as_bytes();
    let mut segments = Vec::new();
    let mut pos = 0;
    let mut lit_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'%' {
            pos += 1;
            continue;
        }
        if pos > lit_start {
            segments.push(Segment::Literal(&bytes[lit_start..pos]));
        }
        pos += 1;
        if pos == bytes.len() {
            return Err(invalid("dangling '%' at end of format"));
        }
        if bytes[pos] == b'%' {
            segments.push(Segment::Percent);
            pos += 1;
        } else if bytes[pos] == b'{' {
            let close = fmt[pos..]
                .find('}')
                .ok_or_else(|| invalid("unterminated '%{' directive"))?;
            let body = &fmt[pos + 1..pos + close];
            segments.push(parse_brace(body)?);
            pos += close + 1;
        } else {
            let (spec, used) = parse_conv(&bytes[pos..])?;
            segments.push(Segment::Conv(spec));
            pos += used;
        }
        lit_start = pos;
    }
    if pos > lit_start {
        segments.push(Segment::Literal(&bytes[lit_start..pos]));
    }
    Ok(segments)
}

/// Parse the body between `%{` and `}`.
fn parse_brace(body: &str) -> Result<Segment<'_>> {
    let (ty_text, fmt_text) = match body.find('[') {
        Some(open) => {
            if !body.ends_with(']') {
                return Err(invalid("unterminated '[' in '%{' directive"));
            }
            (&body[..open], Some(&body[open + 1..body.len() - 1]))
        }
        None => (body, None),
    };
    let ty = match ty_text {
        "" => return Err(invalid("empty type in '%{' directive")),
        "*" => TypePart::FromArg,
        "?" => TypePart::Provided,
        name => TypePart::Registered(name.to_owned()),
    };
    let format = match fmt_text {
        None => FormatPart::Default,
        Some("") => return Err(invalid("empty format in '%{' directive")),
        Some("*") => FormatPart::FromArg,
        Some("?") => FormatPart::Provided,
        Some(name) => FormatPart::Registered(name.to_owned()),
    };
    Ok(Segment::Brace { ty, format })
}

/// Parse a conversion after '%'. Returns the spec and bytes consumed.
fn parse_conv(fmt: &[u8]) -> Result<(ConvSpec, usize)> {
    let mut pos = 0;
    let len = fmt.len();

    let mut flags = FormatFlags::default();
    while pos < len {
        match fmt[pos] {
            b'-' => flags.left_justify = true,
            b'+' => flags.force_sign = true,
            b' ' => flags.space_sign = true,
            b'#' => flags.alt_form = true,
            b'0' => flags.zero_pad = true,
            _ => break,
        }
        pos += 1;
    }
    // '+' overrides ' '; '-' overrides '0'.
    if flags.force_sign {
        flags.space_sign = false;
    }
    if flags.left_justify {
        flags.zero_pad = false;
    }

    let mut width = None;
    let start = pos;
    while pos < len && fmt[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos > start {
        width = Some(parse_decimal(&fmt[start..pos]));
    }

    let mut precision = None;
    if pos < len && fmt[pos] == b'.' {
        pos += 1;
        let start = pos;
        while pos < len && fmt[pos].is_ascii_digit() {
            pos += 1;
        }
        precision = Some(if pos > start {
            parse_decimal(&fmt[start..pos])
        } else {
            0
        });
    }

    if pos == len {
        return Err(invalid("truncated conversion directive"));
    }
    let conversion = fmt[pos];
    match conversion {
        b'd' | b'i' | b'u' | b'x' | b'X' | b'o' | b's' | b'c' | b'f' | b'g' | b'e' => {}
        _ => return Err(invalid("unknown conversion directive")),
    }
    Ok((
        ConvSpec {
            flags,
            width,
            precision,
            conversion,
        },
        pos + 1,
    ))
}

fn parse_decimal(digits: &[u8]) -> usize {
    digits
        .iter()
        .fold(0usize, |acc, &d| acc * 10 + (d - b'0') as usize)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn pad_and_write(out: &Stream, body: &[u8], spec: &ConvSpec, sign_len: usize) -> Result<()> {
    let width = spec.width.unwrap_or(0);
    let pad = width.saturating_sub(body.len());
    if pad == 0 {
        return out.write_all(body);
    }
    if spec.flags.left_justify {
        out.write_all(body)?;
        for _ in 0..pad {
            out.putc(b' ')?;
        }
    } else if spec.flags.zero_pad {
        // Zero padding goes between the sign and the digits.
        out.write_all(&body[..sign_len])?;
        for _ in 0..pad {
            out.putc(b'0')?;
        }
        out.write_all(&body[sign_len..])?;
    } else {
        for _ in 0..pad {
            out.putc(b' ')?;
        }
        out.write_all(body)?;
    }
    Ok(())
}

fn render_unsigned(buf: &mut StrBuf, mut v: u64, base: u64, upper: bool, min_digits: usize) {
    let digits = if upper {
        b"0123456789ABCDEF"
    } else {
        b"0123456789abcdef"
    };
    let mut tmp = [0u8; 64];
    let mut n = 0;
    loop {
        tmp[n] = digits[(v % base) as usize];
        v /= base;
        n += 1;
        if v == 0 {
            break;
        }
    }
    while n < min_digits {
        tmp[n] = b'0';
        n += 1;
    }
    for i in (0..n).rev() {
        buf.push(tmp[i]);
    }
}

fn render_conv(out: &Stream, spec: &ConvSpec, arg: &Arg<'_>) -> Result<()> {
    let mut buf = StrBuf::new();
    let mut sign_len = 0;
    match (spec.conversion, arg) {
        (b'd' | b'i', Arg::Int(v)) => {
            if *v < 0 {
                buf.push(b'-');
                sign_len = 1;
            } else if spec.flags.force_sign {
                buf.push(b'+');
                sign_len = 1;
            } else if spec.flags.space_sign {
                buf.push(b' ');
                sign_len = 1;
            }
            render_unsigned(
                &mut buf,
                v.unsigned_abs(),
                10,
                false,
                spec.precision.unwrap_or(1),
            );
        }
        (b'u', Arg::Uint(v)) => {
            render_unsigned(&mut buf, *v, 10, false, spec.precision.unwrap_or(1));
        }
        (b'x' | b'X', Arg::Uint(v)) => {
            let upper = spec.conversion == b'X';
            if spec.flags.alt_form && *v != 0 {
                buf.push_str(if upper { "0X" } else { "0x" });
                sign_len = 2;
            }
            render_unsigned(&mut buf, *v, 16, upper, spec.precision.unwrap_or(1));
        }
        (b'o', Arg::Uint(v)) => {
            render_unsigned(&mut buf, *v, 8, false, spec.precision.unwrap_or(1));
        }
        (b'f' | b'g' | b'e', Arg::Float(v)) => {
            // Float rendering delegates to the standard formatter.
            match (spec.conversion, spec.precision) {
                (b'f', Some(p)) => buf.push_str(&format!("{v:.p$}")),
                (b'f', None) => buf.push_str(&format!("{v:.6}")),
                (b'e', Some(p)) => buf.push_str(&format!("{v:.p$e}")),
                (b'e', None) => buf.push_str(&format!("{v:e}")),
                _ => buf.push_str(&format!("{v}")),
            }
        }
        (b's', Arg::Str(s)) => {
            let bytes = s.as_bytes();
            let take = spec.precision.unwrap_or(bytes.len()).min(bytes.len());
            buf.push_bytes(&bytes[..take]);
        }
        (b'c', Arg::Char(c)) => buf.push(*c),
        _ => return Err(invalid("argument type does not match the directive")),
    }
    pad_and_write(out, buf.as_bytes(), spec, sign_len)
}

// ---------------------------------------------------------------------------
// The typed argument walk
// ---------------------------------------------------------------------------

struct ArgCursor<'a, 'v> {
    args: &'a [Arg<'v>],
    pos: usize,
}

impl<'a, 'v> ArgCursor<'a, 'v> {
    fn next(&mut self) -> Result<&'a Arg<'v>> {
        let arg = self
            .args
            .get(self.pos)
            .ok_or_else(|| invalid("too few arguments for format"))?;
        self.pos += 1;
        Ok(arg)
    }

    fn next_name(&mut self) -> Result<&'v str> {
        match self.next()? {
            Arg::Name(n) => Ok(*n),
            _ => Err(invalid("expected a name argument")),
        }
    }

    fn next_value(&mut self) -> Result<&'v Value> {
        match self.next()? {
            Arg::Value(v) => Ok(*v),
            _ => Err(invalid("expected a value argument")),
        }
    }
}

/// Write `fmt` with `args` to `out`, returning the bytes emitted.
pub fn write_format(out: &Stream, fmt: &str, args: &[Arg<'_>]) -> Result<usize> {
    let segments = parse_segments(fmt)?;
    let mut cursor = ArgCursor { args, pos: 0 };
    let start = out.tell();

    for segment in &segments {
        match segment {
            Segment::Literal(bytes) => out.write_all(bytes)?,
            Segment::Percent => out.putc(b'%')?,
            Segment::Conv(spec) => {
                let arg = cursor.next()?;
                render_conv(out, spec, arg)?;
            }
            Segment::Brace { ty, format } => {
                let desc: DescRef = match ty {
                    TypePart::Registered(name) => registry::lookup_type(name)
                        .ok_or_else(|| invalid("unregistered type name"))?,
                    TypePart::FromArg => {
                        let name = cursor.next_name()?;
                        registry::lookup_type(name)
                            .ok_or_else(|| invalid("unregistered type name"))?
                    }
                    TypePart::Provided => match cursor.next()? {
                        Arg::Desc(d) => (*d).clone(),
                        _ => return Err(invalid("expected a descriptor argument")),
                    },
                };
                match format {
                    FormatPart::Default => {
                        let value = cursor.next_value()?;
                        Utf8Format.serialize(out, value, &desc)?;
                    }
                    FormatPart::Registered(name) => {
                        let entry = registry::lookup_format(name)
                            .ok_or_else(|| invalid("unregistered format name"))?;
                        let value = cursor.next_value()?;
                        entry.serializer.serialize(out, value, &desc)?;
                    }
                    FormatPart::FromArg => {
                        let name = cursor.next_name()?;
                        let entry = registry::lookup_format(name)
                            .ok_or_else(|| invalid("unregistered format name"))?;
                        let value = cursor.next_value()?;
                        entry.serializer.serialize(out, value, &desc)?;
                    }
                    FormatPart::Provided => {
                        let serializer = match cursor.next()? {
                            Arg::Serializer(s) => *s,
                            _ => return Err(invalid("expected a serializer argument")),
                        };
                        let value = cursor.next_value()?;
                        serializer.serialize(out, value, &desc)?;
                    }
                }
            }
        }
    }

    if cursor.pos != args.len() {
        return Err(invalid("too many arguments for format"));
    }
    Ok((out.tell() - start) as usize)
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// A value produced by [`read_format`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scanned {
    Int(i64),
    Uint(u64),
    Str(String),
    Char(u8),
}

fn skip_stream_ws(input: &Stream) -> Result<()> {
    loop {
        match input.getc()? {
            Some(b) if b.is_ascii_whitespace() => continue,
            Some(b) => {
                input.ungetc(b)?;
                return Ok(());
            }
            None => return Ok(()),
        }
    }
}

fn scan_unsigned(input: &Stream, base: u64) -> Result<Option<u64>> {
    let mut any = false;
    let mut acc: u64 = 0;
    loop {
        match input.getc()? {
            Some(b) => {
                let digit = match b {
                    b'0'..=b'9' => (b - b'0') as u64,
                    b'a'..=b'f' if base == 16 => (b - b'a' + 10) as u64,
                    b'A'..=b'F' if base == 16 => (b - b'A' + 10) as u64,
                    _ => {
                        input.ungetc(b)?;
                        break;
                    }
                };
                any = true;
                acc = acc.wrapping_mul(base).wrapping_add(digit);
            }
            None => break,
        }
    }
    Ok(if any { Some(acc) } else { None })
}

/// Read values from `input` per `fmt` (`%d %i %u %x %s %c`, literals,
/// whitespace). Returns the values assigned before the first mismatch
/// or end of stream.
pub fn read_format(input: &Stream, fmt: &str) -> Result<Vec<Scanned>> {
    let bytes = fmt.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        if b.is_ascii_whitespace() {
            skip_stream_ws(input)?;
            pos += 1;
            continue;
        }
        if b != b'%' {
            match input.getc()? {
                Some(got) if got == b => {}
                Some(got) => {
                    input.ungetc(got)?;
                    return Ok(out);
                }
                None => return Ok(out),
            }
            pos += 1;
            continue;
        }
        pos += 1;
        if pos == bytes.len() {
            return Err(invalid("dangling '%' at end of format"));
        }
        let conv = bytes[pos];
        pos += 1;
        match conv {
            b'%' => match input.getc()? {
                Some(b'%') => {}
                Some(got) => {
                    input.ungetc(got)?;
                    return Ok(out);
                }
                None => return Ok(out),
            },
            b'd' | b'i' => {
                skip_stream_ws(input)?;
                let negative = match input.getc()? {
                    Some(b'-') => true,
                    Some(b'+') => false,
                    Some(b) => {
                        input.ungetc(b)?;
                        false
                    }
                    None => return Ok(out),
                };
                match scan_unsigned(input, 10)? {
                    Some(v) => {
                        let v = v as i64;
                        out.push(Scanned::Int(if negative { -v } else { v }));
                    }
                    None => return Ok(out),
                }
            }
            b'u' => {
                skip_stream_ws(input)?;
                match scan_unsigned(input, 10)? {
                    Some(v) => out.push(Scanned::Uint(v)),
                    None => return Ok(out),
                }
            }
            b'x' => {
                skip_stream_ws(input)?;
                match scan_unsigned(input, 16)? {
                    Some(v) => out.push(Scanned::Uint(v)),
                    None => return Ok(out),
                }
            }
            b's' => {
                skip_stream_ws(input)?;
                let mut buf = StrBuf::new();
                loop {
                    match input.getc()? {
                        Some(b) if !b.is_ascii_whitespace() => buf.push(b),
                        Some(b) => {
                            input.ungetc(b)?;
                            break;
                        }
                        None => break,
                    }
                }
                if buf.is_empty() {
                    return Ok(out);
                }
                out.push(Scanned::Str(buf.take_string()));
            }
            b'c' => match input.getc()? {
                Some(b) => out.push(Scanned::Char(b)),
                None => return Ok(out),
            },
            _ => return Err(invalid("unknown conversion directive")),
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Stream sugar
// ---------------------------------------------------------------------------

impl Stream {
    /// Printf-style formatted write.
    pub fn write_format(&self, fmt: &str, args: &[Arg<'_>]) -> Result<usize> {
        write_format(self, fmt, args)
    }

    /// Scanf-style formatted read.
    pub fn read_format(&self, fmt: &str) -> Result<Vec<Scanned>> {
        read_format(self, fmt)
    }
}
