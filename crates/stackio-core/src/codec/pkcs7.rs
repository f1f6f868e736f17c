//! PKCS#7 padding filters (RFC 5652).
//!
//! The pad filter appends `B - (n mod B)` bytes, each holding that
//! count, after the last source byte — always at least one byte, a full
//! block when the length is already a multiple of B. The strip filter
//! validates and removes that tail; it must hold back one trailing block
//! so the count byte can be examined only once end-of-input is certain.

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::core::Stream;
use crate::stream::device::{Caps, Device};

/// Padding-side filter: appends the pad on the way through.
pub struct Pkcs7Pad {
    inner: Stream,
    block: u8,
    /// Bytes seen so far, modulo the block size.
    seen_mod: u8,
    /// Read path: pad bytes still to serve after the source drained.
    tail: Vec<u8>,
    tail_pos: usize,
    source_done: bool,
    /// Write path: whether close already appended the pad.
    padded: bool,
}

impl Pkcs7Pad {
    /// Pad filter over `inner` with block size 1..=255.
    pub fn new(inner: Stream, block: u8) -> Result<Self> {
        if block == 0 {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "block size must be 1..=255",
            ));
        }
        Ok(Self {
            inner,
            block,
            seen_mod: 0,
            tail: Vec::new(),
            tail_pos: 0,
            source_done: false,
            padded: false,
        })
    }

    fn pad_len(&self) -> u8 {
        self.block - (self.seen_mod % self.block)
    }

    fn bump(&mut self, n: usize) {
        self.seen_mod = ((self.seen_mod as usize + n) % self.block as usize) as u8;
    }
}

impl Device for Pkcs7Pad {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            if !self.source_done {
                let got = self.inner.read(&mut buf[n..])?;
                if got == 0 {
                    self.source_done = true;
                    let k = self.pad_len();
                    self.tail = vec![k; k as usize];
                    self.tail_pos = 0;
                    continue;
                }
                self.bump(got);
                n += got;
                continue;
            }
            let avail = self.tail.len() - self.tail_pos;
            if avail == 0 {
                break;
            }
            let take = avail.min(buf.len() - n);
            buf[n..n + take].copy_from_slice(&self.tail[self.tail_pos..self.tail_pos + take]);
            self.tail_pos += take;
            n += take;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner.write_all(buf)?;
        self.bump(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        // Pad exactly once, at end of input.
        if !self.padded {
            self.padded = true;
            let k = self.pad_len();
            let pad = vec![k; k as usize];
            self.inner.write_all(&pad)?;
        }
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "pkcs7_pad"
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write()
    }
}

/// Strip-side filter: validates and removes the pad.
pub struct Pkcs7Unpad {
    inner: Stream,
    block: u8,
    /// Holdback of the most recent bytes, at most one block.
    held: Vec<u8>,
    source_done: bool,
    /// Validated bytes ready to serve on the read path.
    ready: Vec<u8>,
    ready_pos: usize,
    /// Whether any bytes went through the write path.
    wrote: bool,
}

impl Pkcs7Unpad {
    /// Strip filter over `inner` with block size 1..=255.
    pub fn new(inner: Stream, block: u8) -> Result<Self> {
        if block == 0 {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "block size must be 1..=255",
            ));
        }
        Ok(Self {
            inner,
            block,
            held: Vec::new(),
            source_done: false,
            ready: Vec::new(),
            ready_pos: 0,
            wrote: false,
        })
    }

    /// Validate the held tail and return the byte count to drop.
    fn pad_count(&self) -> Result<usize> {
        let k = match self.held.last() {
            Some(&k) => k as usize,
            None => {
                return Err(StreamError::new(
                    ErrorKind::BadMessage,
                    "empty input has no padding",
                ));
            }
        };
        if k == 0 || k > self.block as usize || k > self.held.len() {
            return Err(StreamError::new(
                ErrorKind::BadMessage,
                "pad count outside the block",
            ));
        }
        let tail = &self.held[self.held.len() - k..];
        if tail.iter().any(|&b| b as usize != k) {
            return Err(StreamError::new(
                ErrorKind::BadMessage,
                "pad bytes disagree with the count",
            ));
        }
        Ok(k)
    }

    /// Feed bytes through the holdback, spilling anything beyond one
    /// block into `out`.
    fn absorb(&mut self, data: &[u8], out: &mut Vec<u8>) {
        self.held.extend_from_slice(data);
        let keep = self.block as usize;
        if self.held.len() > keep {
            let spill = self.held.len() - keep;
            out.extend_from_slice(&self.held[..spill]);
            self.held.drain(..spill);
        }
    }
}

impl Device for Pkcs7Unpad {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        loop {
            // Serve whatever has been validated.
            let avail = self.ready.len() - self.ready_pos;
            if avail > 0 {
                let take = avail.min(buf.len() - n);
                buf[n..n + take]
                    .copy_from_slice(&self.ready[self.ready_pos..self.ready_pos + take]);
                self.ready_pos += take;
                n += take;
            }
            if n == buf.len() || self.source_done {
                return Ok(n);
            }

            // Refill: keep one block held back until eof is observed.
            let mut chunk = [0u8; 4096];
            let got = self.inner.read(&mut chunk)?;
            let mut spill = Vec::new();
            if got == 0 {
                self.source_done = true;
                let k = self.pad_count()?;
                let cut = self.held.len() - k;
                spill.extend_from_slice(&self.held[..cut]);
                self.held.clear();
            } else {
                self.absorb(&chunk[..got], &mut spill);
            }
            if self.ready_pos == self.ready.len() {
                self.ready.clear();
                self.ready_pos = 0;
            }
            self.ready.extend_from_slice(&spill);
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.wrote = true;
        let mut spill = Vec::new();
        self.absorb(buf, &mut spill);
        if !spill.is_empty() {
            self.inner.write_all(&spill)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        // Only a write-path filter owes validation at close; a reader's
        // tail was already examined when the source reported eof.
        if self.wrote && !self.source_done {
            self.source_done = true;
            let k = self.pad_count()?;
            let cut = self.held.len() - k;
            if cut > 0 {
                let body = self.held[..cut].to_vec();
                self.inner.write_all(&body)?;
            }
            self.held.clear();
        }
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "pkcs7_unpad"
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write()
    }
}

impl Stream {
    /// Padding filter over `inner`.
    pub fn pkcs7_pad(inner: &Stream, block: u8, mode: &str) -> Result<Stream> {
        Stream::custom(Pkcs7Pad::new(inner.clone(), block)?, mode)
    }

    /// Pad-stripping filter over `inner`.
    pub fn pkcs7_unpad(inner: &Stream, block: u8, mode: &str) -> Result<Stream> {
        Stream::custom(Pkcs7Unpad::new(inner.clone(), block)?, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_via_write(block: u8, data: &[u8]) -> Vec<u8> {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let pad = Stream::pkcs7_pad(&sink, block, "wb").unwrap();
        pad.write_all(data).unwrap();
        pad.close().unwrap();
        sink.contents().unwrap()
    }

    fn unpad_via_write(block: u8, data: &[u8]) -> Result<Vec<u8>> {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let unpad = Stream::pkcs7_unpad(&sink, block, "wb").unwrap();
        unpad.write_all(data)?;
        unpad.close()?;
        sink.contents()
    }

    #[test]
    fn test_pad_lengths() {
        assert_eq!(pad_via_write(8, b"abc"), b"abc\x05\x05\x05\x05\x05");
        // Exact multiple gets a full extra block.
        assert_eq!(pad_via_write(4, b"abcd"), b"abcd\x04\x04\x04\x04");
        // Empty input still gets a block.
        assert_eq!(pad_via_write(3, b""), b"\x03\x03\x03");
    }

    #[test]
    fn test_pad_read_path() {
        let src = Stream::cstring(&b"hi"[..]);
        let pad = Stream::pkcs7_pad(&src, 4, "rb").unwrap();
        let mut out = [0u8; 8];
        let n = pad.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"hi\x02\x02");
    }

    #[test]
    fn test_unpad_write_path() {
        assert_eq!(unpad_via_write(8, b"abc\x05\x05\x05\x05\x05").unwrap(), b"abc");
        assert_eq!(unpad_via_write(4, b"abcd\x04\x04\x04\x04").unwrap(), b"abcd");
    }

    #[test]
    fn test_unpad_read_path_holds_back_tail() {
        let padded = b"hello\x03\x03\x03";
        let src = Stream::dynamic_buffer_with(padded.to_vec(), "rb").unwrap();
        let unpad = Stream::pkcs7_unpad(&src, 8, "rb").unwrap();
        let mut out = [0u8; 16];
        let n = unpad.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"hello");
        assert_eq!(unpad.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_unpad_rejects_bad_padding() {
        let err = unpad_via_write(8, b"abc\x05\x04\x05\x05\x05").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMessage);
        let err = unpad_via_write(4, b"abcd\x00").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMessage);
        let err = unpad_via_write(4, b"ab\x09").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMessage);
    }

    #[test]
    fn test_roundtrip_many_block_sizes() {
        let data = b"The quick brown fox jumps over the lazy dog";
        for block in [1u8, 2, 3, 7, 8, 16, 43, 44, 255] {
            let padded = pad_via_write(block, data);
            assert_eq!(padded.len() % block as usize, 0);
            // ceil((n+1)/B)*B.
            let expect = (data.len() / block as usize + 1) * block as usize;
            assert_eq!(padded.len(), expect);
            let back = unpad_via_write(block, &padded).unwrap();
            assert_eq!(back, data, "block size {block}");
        }
    }

    #[test]
    fn test_zero_block_rejected() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        assert!(Stream::pkcs7_pad(&sink, 0, "wb").is_err());
        assert!(Stream::pkcs7_unpad(&sink, 0, "wb").is_err());
    }
}
