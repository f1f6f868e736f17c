//! Limit filter: a fixed window onto an inner stream.
//!
//! Reads and writes are capped to `[offset, offset + length)` of the
//! inner stream. Seeks inside the window are translated; seeks outside
//! fail without moving anything.

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::core::Stream;
use crate::stream::device::{Caps, Device, SeekFrom};

/// Windowed view over an inner stream.
pub struct LimitFilter {
    inner: Stream,
    offset: u64,
    length: u64,
    /// Position within the window.
    pos: u64,
    /// Whether the inner stream has been positioned yet.
    positioned: bool,
}

impl LimitFilter {
    pub fn new(inner: Stream, offset: u64, length: u64) -> Self {
        Self {
            inner,
            offset,
            length,
            pos: 0,
            positioned: false,
        }
    }

    fn ensure_positioned(&mut self) -> Result<()> {
        if !self.positioned {
            self.inner.seek(SeekFrom::Start(self.offset))?;
            self.positioned = true;
        }
        Ok(())
    }

    fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.pos)
    }
}

impl Device for LimitFilter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_positioned()?;
        let take = (self.remaining().min(buf.len() as u64)) as usize;
        if take == 0 {
            return Ok(0);
        }
        let n = self.inner.read(&mut buf[..take])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_positioned()?;
        let take = (self.remaining().min(buf.len() as u64)) as usize;
        if take == 0 && !buf.is_empty() {
            return Err(StreamError::new(
                ErrorKind::NoBufferSpace,
                "write past the window",
            ));
        }
        let n = self.inner.write(&buf[..take])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(d) => self.pos as i64 + d,
            SeekFrom::End(d) => self.length as i64 + d,
        };
        if target < 0 || target as u64 > self.length {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "seek outside the window",
            ));
        }
        self.inner.seek(SeekFrom::Start(self.offset + target as u64))?;
        self.pos = target as u64;
        self.positioned = true;
        Ok(self.pos)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.length)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn describe(&self) -> &'static str {
        "limit"
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write().seekable()
    }
}

impl Stream {
    /// Windowed filter over `[offset, offset + length)` of `inner`.
    pub fn limit(inner: &Stream, offset: u64, length: u64, mode: &str) -> Result<Stream> {
        Stream::custom(LimitFilter::new(inner.clone(), offset, length), mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_reads_window_only() {
        let inner = Stream::cstring(&b"0123456789"[..]);
        let w = Stream::limit(&inner, 2, 5, "rb").unwrap();
        let mut out = [0u8; 16];
        let n = w.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"23456");
        assert_eq!(w.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_limit_writes_capped() {
        let inner = Stream::dynamic_buffer_with(vec![b'.'; 10], "r+b").unwrap();
        let w = Stream::limit(&inner, 3, 4, "wb").unwrap();
        assert_eq!(w.write(b"XYZW!!").unwrap(), 4);
        assert!(w.error().is_some() || w.write(b"!").is_err());
        assert_eq!(inner.contents().unwrap(), b"...XYZW...");
    }

    #[test]
    fn test_limit_seek_translation() {
        let inner = Stream::cstring(&b"0123456789"[..]);
        let w = Stream::limit(&inner, 2, 5, "rb").unwrap();
        w.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(w.getc().unwrap(), Some(b'5'));
        assert!(w.seek(SeekFrom::Start(6)).is_err());
        w.seek(SeekFrom::End(-1)).unwrap();
        assert_eq!(w.getc().unwrap(), Some(b'6'));
    }
}
