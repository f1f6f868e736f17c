//! SHA-1 digest filter.
//!
//! FIPS-180-4 compression over 64-byte blocks. Three filter shapes,
//! chosen by the open mode:
//!
//! - read-only: drain the inner stream, then serve the 20 digest bytes;
//!   positions within [0, 20] are seekable.
//! - write-only: writes pass into the hash; close finalizes and writes
//!   the 20-byte big-endian digest to the inner stream.
//! - read+write: writes feed the hash, reads serve the digest of a
//!   snapshot so writing can continue; close emits nothing.

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::core::Stream;
use crate::stream::device::{Caps, Device, SeekFrom};

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 20;

const BLOCK_LEN: usize = 64;

/// Rolling hash state.
#[derive(Clone)]
pub struct Sha1State {
    h: [u32; 5],
    block: [u8; BLOCK_LEN],
    block_len: usize,
    /// Message length in bits.
    len_bits: u64,
}

impl Sha1State {
    pub fn new() -> Self {
        Self {
            h: [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476, 0xc3d2e1f0],
            block: [0u8; BLOCK_LEN],
            block_len: 0,
            len_bits: 0,
        }
    }

    /// Absorb message bytes.
    pub fn update(&mut self, mut data: &[u8]) {
        self.len_bits = self.len_bits.wrapping_add((data.len() as u64) * 8);
        while !data.is_empty() {
            let take = (BLOCK_LEN - self.block_len).min(data.len());
            self.block[self.block_len..self.block_len + take].copy_from_slice(&data[..take]);
            self.block_len += take;
            data = &data[take..];
            if self.block_len == BLOCK_LEN {
                let block = self.block;
                self.compress(&block);
                self.block_len = 0;
            }
        }
    }

    /// Pad, compress the tail, and produce the big-endian digest.
    pub fn finalize(mut self) -> [u8; DIGEST_LEN] {
        let len_bits = self.len_bits;
        self.update(&[0x80]);
        // `update` counted the pad byte; the length field must not.
        self.len_bits = len_bits;
        while self.block_len != 56 {
            let fill = self.block_len;
            self.block[fill] = 0;
            self.block_len += 1;
            if self.block_len == BLOCK_LEN {
                let block = self.block;
                self.compress(&block);
                self.block_len = 0;
            }
        }
        self.block[56..64].copy_from_slice(&len_bits.to_be_bytes());
        let block = self.block;
        self.compress(&block);

        let mut digest = [0u8; DIGEST_LEN];
        for (i, word) in self.h.iter().enumerate() {
            digest[4 * i..4 * i + 4].copy_from_slice(&word.to_be_bytes());
        }
        digest
    }

    fn compress(&mut self, block: &[u8; BLOCK_LEN]) {
        let mut w = [0u32; 80];
        for (i, chunk) in block.chunks_exact(4).enumerate() {
            w[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        for i in 16..80 {
            w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
        }

        let [mut a, mut b, mut c, mut d, mut e] = self.h;
        for (i, &wi) in w.iter().enumerate() {
            let (f, k) = match i {
                0..=19 => ((b & c) | (!b & d), 0x5a827999u32),
                20..=39 => (b ^ c ^ d, 0x6ed9eba1),
                40..=59 => ((b & c) | (b & d) | (c & d), 0x8f1bbcdc),
                _ => (b ^ c ^ d, 0xca62c1d6),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(wi);
            e = d;
            d = c;
            c = b;
            b = a.rotate_left(30);
            a = temp;
        }

        self.h[0] = self.h[0].wrapping_add(a);
        self.h[1] = self.h[1].wrapping_add(b);
        self.h[2] = self.h[2].wrapping_add(c);
        self.h[3] = self.h[3].wrapping_add(d);
        self.h[4] = self.h[4].wrapping_add(e);
    }
}

impl Default for Sha1State {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot digest of a byte slice.
pub fn sha1(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut s = Sha1State::new();
    s.update(data);
    s.finalize()
}

// ---------------------------------------------------------------------------
// Filter device
// ---------------------------------------------------------------------------

/// SHA-1 filter device.
pub struct Sha1Filter {
    inner: Stream,
    state: Sha1State,
    readable: bool,
    writable: bool,
    /// Digest served on the read side, once computed.
    digest: Option<[u8; DIGEST_LEN]>,
    /// Cursor into the served digest.
    cursor: usize,
}

impl Sha1Filter {
    /// Build a filter over `inner`; `readable`/`writable` select the
    /// shape (digest source, digest-on-close sink, or both).
    pub fn new(inner: Stream, readable: bool, writable: bool) -> Result<Self> {
        if !readable && !writable {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "mode grants no capabilities",
            ));
        }
        Ok(Self {
            inner,
            state: Sha1State::new(),
            readable,
            writable,
            digest: None,
            cursor: 0,
        })
    }

    /// Drain the inner stream into the hash (read-only shape).
    fn consume_inner(&mut self) -> Result<()> {
        let mut buf = [0u8; 4096];
        loop {
            let n = self.inner.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            self.state.update(&buf[..n]);
        }
    }
}

impl Device for Sha1Filter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.readable {
            return Err(StreamError::new(
                ErrorKind::NotSupported,
                "write-only sha1 filter",
            ));
        }
        let digest = if self.writable {
            // Snapshot: writes may continue feeding the hash afterwards.
            self.state.clone().finalize()
        } else {
            match self.digest {
                Some(d) => d,
                None => {
                    self.consume_inner()?;
                    let d = self.state.clone().finalize();
                    self.digest = Some(d);
                    d
                }
            }
        };
        let avail = DIGEST_LEN.saturating_sub(self.cursor);
        let take = avail.min(buf.len());
        buf[..take].copy_from_slice(&digest[self.cursor..self.cursor + take]);
        self.cursor += take;
        Ok(take)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(StreamError::new(
                ErrorKind::NotSupported,
                "read-only sha1 filter",
            ));
        }
        self.state.update(buf);
        Ok(buf.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if !self.readable {
            return Err(StreamError::new(
                ErrorKind::SeekNotSupported,
                "write-only sha1 filter",
            ));
        }
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(d) => self.cursor as i64 + d,
            SeekFrom::End(d) => DIGEST_LEN as i64 + d,
        };
        if !(0..=DIGEST_LEN as i64).contains(&target) {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "seek outside the digest",
            ));
        }
        self.cursor = target as usize;
        Ok(self.cursor as u64)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.cursor as u64)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(DIGEST_LEN as u64)
    }

    fn close(&mut self) -> Result<()> {
        if self.writable && !self.readable {
            // Digest-on-close sink; the close fails if the write fails.
            let digest = self.state.clone().finalize();
            self.inner.write_all(&digest)?;
        }
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "sha1"
    }

    fn capabilities(&self) -> Caps {
        Caps {
            readable: self.readable,
            writable: self.writable,
            seekable: self.readable,
            reject_nul_pushback: false,
        }
    }
}

impl Stream {
    /// SHA-1 filter over `inner`; the mode string picks the shape.
    pub fn sha1(inner: &Stream, mode: &str) -> Result<Stream> {
        let flags = crate::stream::mode::parse_mode(mode);
        Stream::custom(
            Sha1Filter::new(inner.clone(), flags.readable, flags.writable)?,
            mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(d: &[u8]) -> String {
        d.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_known_answer_abc() {
        assert_eq!(
            hex(&sha1(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_known_answer_empty() {
        assert_eq!(hex(&sha1(b"")), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_known_answer_448_bits() {
        assert_eq!(
            hex(&sha1(b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq")),
            "84983e441c3bd26ebaae4aa1f95129e5e54670f1"
        );
    }

    #[test]
    fn test_million_a() {
        let mut s = Sha1State::new();
        let chunk = [b'a'; 1000];
        for _ in 0..1000 {
            s.update(&chunk);
        }
        assert_eq!(
            hex(&s.finalize()),
            "34aa973cd4c4daa4f61eeb2bdbad27316534016f"
        );
    }

    #[test]
    fn test_read_only_filter_serves_digest() {
        let src = Stream::cstring(&b"abc"[..]);
        let h = Stream::sha1(&src, "rb").unwrap();
        let mut out = [0u8; DIGEST_LEN];
        let n = h.read(&mut out).unwrap();
        assert_eq!(n, DIGEST_LEN);
        assert_eq!(hex(&out), "a9993e364706816aba3e25717850c26c9cd0d89d");
        // Past the digest: eof.
        let mut extra = [0u8; 4];
        assert_eq!(h.read(&mut extra).unwrap(), 0);
        assert!(h.eof());
    }

    #[test]
    fn test_read_only_filter_seek_within_digest() {
        let src = Stream::cstring(&b"abc"[..]);
        let h = Stream::sha1(&src, "rb").unwrap();
        let mut out = [0u8; 4];
        h.read(&mut out).unwrap();
        h.seek(SeekFrom::Start(0)).unwrap();
        let mut again = [0u8; 4];
        h.read(&mut again).unwrap();
        assert_eq!(out, again);
        assert!(h.seek(SeekFrom::Start(21)).is_err());
    }

    #[test]
    fn test_write_only_filter_emits_on_close() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let h = Stream::sha1(&sink, "wb").unwrap();
        h.write_all(b"abc").unwrap();
        h.close().unwrap();
        assert_eq!(
            hex(&sink.contents().unwrap()),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_read_write_filter_snapshots() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let h = Stream::sha1(&sink, "r+b").unwrap();
        h.write_all(b"ab").unwrap();
        h.seek(SeekFrom::Current(0)).unwrap();
        let mut snap = [0u8; DIGEST_LEN];
        h.read(&mut snap).unwrap();
        assert_eq!(hex(&snap), hex(&sha1(b"ab")));
        // Writing continues from the live state.
        h.seek(SeekFrom::Start(0)).unwrap();
        h.write_all(b"c").unwrap();
        h.seek(SeekFrom::Current(0)).unwrap();
        let mut snap2 = [0u8; DIGEST_LEN];
        h.read(&mut snap2).unwrap();
        assert_eq!(hex(&snap2), hex(&sha1(b"abc")));
        // Close emits nothing in read+write shape.
        h.close().unwrap();
        assert_eq!(sink.contents().unwrap(), b"");
    }
}
