//! Hex encode/decode filters.
//!
//! Encode maps each input byte to two lowercase ASCII hex digits; decode
//! maps digit pairs back to bytes. Both directions are uniform filters:
//! a read pulls operation input from the inner stream and serves the
//! operation output, a write accepts operation input and emits the
//! operation output to the inner stream.
//!
//! The only per-filter state is the pending nibble: on the encode read
//! path it is the low nibble of a source byte whose high digit has been
//! served; on the decode write path it is the high nibble awaiting its
//! partner digit.

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::core::Stream;
use crate::stream::device::{Caps, Device, SeekFrom};
use crate::stream::state::Direction;

const ALPHABET: &[u8; 16] = b"0123456789abcdef";

fn hex_digit(nibble: u8) -> u8 {
    ALPHABET[(nibble & 0x0f) as usize]
}

fn nibble_of(digit: u8) -> Option<u8> {
    match digit.to_ascii_lowercase() {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Byte-to-hex filter over an inner stream.
pub struct HexEncode {
    inner: Stream,
    /// Low nibble of the byte whose high digit has been served.
    pending: Option<u8>,
}

impl HexEncode {
    /// Wrap `inner`; the filter borrows it and never closes it.
    pub fn new(inner: Stream) -> Self {
        Self {
            inner,
            pending: None,
        }
    }
}

impl Device for HexEncode {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            if let Some(nib) = self.pending.take() {
                buf[n] = hex_digit(nib);
                n += 1;
                continue;
            }
            match self.inner.getc()? {
                Some(byte) => {
                    buf[n] = hex_digit(byte >> 4);
                    n += 1;
                    self.pending = Some(byte & 0x0f);
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        for &byte in buf {
            let pair = [hex_digit(byte >> 4), hex_digit(byte & 0x0f)];
            self.inner.write_all(&pair)?;
        }
        Ok(buf.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p,
            _ => {
                return Err(StreamError::new(
                    ErrorKind::SeekNotSupported,
                    "hex filter seeks are absolute",
                ));
            }
        };
        self.inner.seek(SeekFrom::Start(target / 2))?;
        if target % 2 == 1 {
            // Consume the high nibble so the next read serves the low one.
            match self.inner.getc()? {
                Some(byte) => self.pending = Some(byte & 0x0f),
                None => {
                    return Err(StreamError::new(
                        ErrorKind::InvalidArgument,
                        "seek past end of hex source",
                    ));
                }
            }
        } else {
            self.pending = None;
        }
        Ok(target)
    }

    fn tell(&mut self) -> Result<u64> {
        let inner = self.inner.tell();
        Ok(inner * 2 - if self.pending.is_some() { 1 } else { 0 })
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn switch_direction(&mut self, to: Direction) -> Result<()> {
        if to == Direction::Fresh {
            self.pending = None;
        }
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "hex_encode"
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write().seekable()
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Hex-to-byte filter over an inner stream.
pub struct HexDecode {
    inner: Stream,
    /// High nibble awaiting its partner digit on the write path.
    pending: Option<u8>,
}

impl HexDecode {
    /// Wrap `inner`; the filter borrows it and never closes it.
    pub fn new(inner: Stream) -> Self {
        Self {
            inner,
            pending: None,
        }
    }
}

impl Device for HexDecode {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            let hi = match self.inner.getc()? {
                Some(c) => c,
                None => break,
            };
            let hi = nibble_of(hi).ok_or_else(|| {
                StreamError::new(ErrorKind::BadMessage, "non-hex digit in input")
            })?;
            let lo = match self.inner.getc()? {
                Some(c) => c,
                None => {
                    return Err(StreamError::new(
                        ErrorKind::BadMessage,
                        "odd-length hex input",
                    ));
                }
            };
            let lo = nibble_of(lo).ok_or_else(|| {
                StreamError::new(ErrorKind::BadMessage, "non-hex digit in input")
            })?;
            buf[n] = (hi << 4) | lo;
            n += 1;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        // Non-hex input is ignored on the write path.
        for &c in buf {
            let Some(nib) = nibble_of(c) else { continue };
            match self.pending.take() {
                Some(hi) => self.inner.putc((hi << 4) | nib)?,
                None => self.pending = Some(nib),
            }
        }
        Ok(buf.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p,
            _ => {
                return Err(StreamError::new(
                    ErrorKind::SeekNotSupported,
                    "hex filter seeks are absolute",
                ));
            }
        };
        self.inner.seek(SeekFrom::Start(target * 2))?;
        self.pending = None;
        Ok(target)
    }

    fn tell(&mut self) -> Result<u64> {
        let inner = self.inner.tell();
        Ok(inner / 2 + if self.pending.is_some() { 1 } else { 0 })
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn switch_direction(&mut self, to: Direction) -> Result<()> {
        if to == Direction::Fresh {
            self.pending = None;
        }
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "hex_decode"
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write().seekable()
    }
}

// ---------------------------------------------------------------------------
// Stream constructors
// ---------------------------------------------------------------------------

impl Stream {
    /// Hex-encoding filter over `inner`.
    pub fn hex_encode(inner: &Stream, mode: &str) -> Result<Stream> {
        Stream::custom(HexEncode::new(inner.clone()), mode)
    }

    /// Hex-decoding filter over `inner`.
    pub fn hex_decode(inner: &Stream, mode: &str) -> Result<Stream> {
        Stream::custom(HexDecode::new(inner.clone()), mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_write_pipeline() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let enc = Stream::hex_encode(&sink, "wb").unwrap();
        enc.write_all(&[0xff, 0x00, 0x10]).unwrap();
        enc.close().unwrap();
        assert_eq!(sink.contents().unwrap(), b"ff0010");
    }

    #[test]
    fn test_encode_read_pipeline() {
        let src = Stream::cstring(&[0xde, 0xad][..]);
        let enc = Stream::hex_encode(&src, "rb").unwrap();
        let mut out = [0u8; 8];
        let n = enc.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"dead");
    }

    #[test]
    fn test_encode_read_byte_at_a_time() {
        let src = Stream::cstring(&[0xab][..]);
        let enc = Stream::hex_encode(&src, "rb").unwrap();
        assert_eq!(enc.getc().unwrap(), Some(b'a'));
        assert_eq!(enc.getc().unwrap(), Some(b'b'));
        assert_eq!(enc.getc().unwrap(), None);
    }

    #[test]
    fn test_decode_read() {
        let src = Stream::cstring(&b"ff0010"[..]);
        let dec = Stream::hex_decode(&src, "rb").unwrap();
        let mut out = [0u8; 8];
        let n = dec.read(&mut out).unwrap();
        assert_eq!(&out[..n], &[0xff, 0x00, 0x10]);
    }

    #[test]
    fn test_decode_read_uppercase_folds() {
        let src = Stream::cstring(&b"DEADBEEF"[..]);
        let dec = Stream::hex_decode(&src, "rb").unwrap();
        let mut out = [0u8; 4];
        let n = dec.read(&mut out).unwrap();
        assert_eq!(&out[..n], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_decode_read_rejects_garbage() {
        let src = Stream::cstring(&b"zz"[..]);
        let dec = Stream::hex_decode(&src, "rb").unwrap();
        let mut out = [0u8; 2];
        let err = dec.read(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMessage);
    }

    #[test]
    fn test_decode_write_ignores_garbage() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let dec = Stream::hex_decode(&sink, "wb").unwrap();
        dec.write_all(b"f f:0 0;1 0").unwrap();
        dec.close().unwrap();
        assert_eq!(sink.contents().unwrap(), &[0xff, 0x00, 0x10]);
    }

    #[test]
    fn test_roundtrip_write_then_read() {
        let data: Vec<u8> = (0u16..=255).map(|b| b as u8).collect();
        let mid = Stream::dynamic_buffer("r+b").unwrap();
        let enc = Stream::hex_encode(&mid, "wb").unwrap();
        enc.write_all(&data).unwrap();
        enc.close().unwrap();

        mid.seek(SeekFrom::Start(0)).unwrap();
        let dec = Stream::hex_decode(&mid, "rb").unwrap();
        let mut out = vec![0u8; 256];
        let n = dec.read(&mut out).unwrap();
        assert_eq!(n, 256);
        assert_eq!(out, data);
    }

    #[test]
    fn test_encode_seek_odd_position() {
        let src = Stream::cstring(&[0xab, 0xcd][..]);
        let enc = Stream::hex_encode(&src, "rb").unwrap();
        enc.seek(SeekFrom::Start(1)).unwrap();
        assert_eq!(enc.getc().unwrap(), Some(b'b'));
        assert_eq!(enc.getc().unwrap(), Some(b'c'));
    }

    #[test]
    fn test_encode_tell_accounts_for_pending() {
        let src = Stream::cstring(&[0xab][..]);
        let mut enc = HexEncode::new(src);
        let mut one = [0u8; 1];
        enc.read(&mut one).unwrap();
        // One source byte consumed, one digit served, one pending.
        assert_eq!(enc.tell().unwrap(), 1);
        enc.read(&mut one).unwrap();
        assert_eq!(enc.tell().unwrap(), 2);
    }

    #[test]
    fn test_decode_tell_accounts_for_pending() {
        let src = Stream::cstring(&b"abcd"[..]);
        let mut dec = HexDecode::new(src);
        let mut one = [0u8; 1];
        dec.read(&mut one).unwrap();
        // Two source digits consumed per output byte.
        assert_eq!(dec.tell().unwrap(), 1);
        dec.read(&mut one).unwrap();
        assert_eq!(dec.tell().unwrap(), 2);
    }

    #[test]
    fn test_decode_write_pending_raises_tell() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let mut dec = HexDecode::new(sink);
        dec.write(b"a").unwrap();
        assert_eq!(dec.tell().unwrap(), 1);
    }

    #[test]
    fn test_closing_filter_leaves_inner_open() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let enc = Stream::hex_encode(&sink, "wb").unwrap();
        enc.write_all(&[0x01]).unwrap();
        enc.close().unwrap();
        assert!(!sink.is_closed());
        sink.write_all(b"!").unwrap();
        assert_eq!(sink.contents().unwrap(), b"01!");
    }
}
