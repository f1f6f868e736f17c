//! Concat filter: two inner streams as one sequential surface.
//!
//! Reads drain the first stream, then the second. Writes fill the first
//! until it reports it is out of space, then spill to the second.

use crate::error::{ErrorKind, Result};
use crate::stream::core::Stream;
use crate::stream::device::{Caps, Device};

/// Sequential pair of inner streams.
pub struct ConcatFilter {
    first: Stream,
    second: Stream,
    /// Set once reads or writes have moved on to the second stream.
    on_second: bool,
}

impl ConcatFilter {
    pub fn new(first: Stream, second: Stream) -> Self {
        Self {
            first,
            second,
            on_second: false,
        }
    }
}

impl Device for ConcatFilter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        if !self.on_second {
            n = self.first.read(buf)?;
            if n == 0 {
                self.on_second = true;
            }
        }
        if self.on_second {
            n += self.second.read(&mut buf[n..])?;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.on_second {
            return self.second.write(buf);
        }
        match self.first.write(buf) {
            Ok(n) if n == buf.len() => Ok(n),
            Ok(n) => {
                // First stream is at capacity; the spill continues in the
                // second. The partial write left its sticky mark on the
                // first stream, which is no longer part of the surface.
                self.first.clear_err();
                self.on_second = true;
                let rest = self.second.write(&buf[n..])?;
                Ok(n + rest)
            }
            Err(e) if e.kind() == ErrorKind::NoBufferSpace => {
                self.first.clear_err();
                self.on_second = true;
                self.second.write(buf)
            }
            Err(e) => Err(e),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.first.flush()?;
        self.second.flush()
    }

    fn describe(&self) -> &'static str {
        "concat"
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write()
    }
}

impl Stream {
    /// Concatenation filter over `first` then `second`.
    pub fn concat(first: &Stream, second: &Stream, mode: &str) -> Result<Stream> {
        Stream::custom(ConcatFilter::new(first.clone(), second.clone()), mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_reads_drain_in_order() {
        let a = Stream::cstring(&b"first,"[..]);
        let b = Stream::cstring(&b"second"[..]);
        let c = Stream::concat(&a, &b, "rb").unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 5];
        loop {
            let n = c.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, b"first,second");
    }

    #[test]
    fn test_concat_writes_spill_to_second() {
        let a = Stream::sized_buffer(vec![0u8; 4], "wb").unwrap();
        let b = Stream::dynamic_buffer("wb").unwrap();
        let c = Stream::concat(&a, &b, "wb").unwrap();
        c.write_all(b"abcdefgh").unwrap();
        c.close().unwrap();
        assert_eq!(a.contents().unwrap(), b"abcd");
        assert_eq!(b.contents().unwrap(), b"efgh");
    }

    #[test]
    fn test_concat_write_at_exact_boundary() {
        let a = Stream::sized_buffer(vec![0u8; 4], "wb").unwrap();
        let b = Stream::dynamic_buffer("wb").unwrap();
        let c = Stream::concat(&a, &b, "wb").unwrap();
        c.write_all(b"abcd").unwrap();
        c.write_all(b"ef").unwrap();
        assert_eq!(a.contents().unwrap(), b"abcd");
        assert_eq!(b.contents().unwrap(), b"ef");
    }
}
