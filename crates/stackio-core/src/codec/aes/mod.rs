//! AES filter: block cipher in a chaining mode over an inner stream.
//!
//! The filter moves whole 16-byte blocks. A write stages bytes and emits
//! each block to the inner stream as it fills; a read pulls whole blocks
//! from the inner stream and serves bytes on demand. A trailing partial
//! block is never emitted — padding the tail to a block boundary is the
//! padding filter's job, stacked under this one.
//!
//! CFB and OFB run the forward cipher in both directions; that is the
//! mode definition, not an oversight.

pub mod block;

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::core::Stream;
use crate::stream::device::{Caps, Device};

pub use block::{AesKey, BLOCK};

/// Chaining mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesMode {
    Ecb,
    Cbc,
    Pcbc,
    Cfb,
    Ofb,
}

/// Whether the filter transforms plaintext to ciphertext or back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherOp {
    Encrypt,
    Decrypt,
}

/// AES filter device.
pub struct AesFilter {
    inner: Stream,
    key: AesKey,
    mode: AesMode,
    op: CipherOp,
    /// Chaining value; starts at the IV.
    prev: [u8; BLOCK],
    /// Write-path staging for a partially filled input block.
    staged: [u8; BLOCK],
    staged_len: usize,
    /// Read-path output block being served.
    out: [u8; BLOCK],
    out_pos: usize,
    out_len: usize,
}

impl AesFilter {
    /// Build a filter over `inner`. Every mode but ECB requires a 16-byte
    /// IV; ECB must not be given one.
    pub fn new(
        inner: Stream,
        key: &[u8],
        mode: AesMode,
        op: CipherOp,
        iv: Option<[u8; BLOCK]>,
    ) -> Result<Self> {
        let key = AesKey::new(key)?;
        let prev = match (mode, iv) {
            (AesMode::Ecb, None) => [0u8; BLOCK],
            (AesMode::Ecb, Some(_)) => {
                return Err(StreamError::new(
                    ErrorKind::InvalidArgument,
                    "ECB takes no IV",
                ));
            }
            (_, Some(iv)) => iv,
            (_, None) => {
                return Err(StreamError::new(
                    ErrorKind::InvalidArgument,
                    "chaining mode requires a 16-byte IV",
                ));
            }
        };
        Ok(Self {
            inner,
            key,
            mode,
            op,
            prev,
            staged: [0u8; BLOCK],
            staged_len: 0,
            out: [0u8; BLOCK],
            out_pos: 0,
            out_len: 0,
        })
    }

    /// Transform one block, updating the chaining value.
    fn process(&mut self, input: &[u8; BLOCK]) -> [u8; BLOCK] {
        let mut b = *input;
        match (self.mode, self.op) {
            (AesMode::Ecb, CipherOp::Encrypt) => self.key.encrypt_block(&mut b),
            (AesMode::Ecb, CipherOp::Decrypt) => self.key.decrypt_block(&mut b),
            (AesMode::Cbc, CipherOp::Encrypt) => {
                xor_into(&mut b, &self.prev);
                self.key.encrypt_block(&mut b);
                self.prev = b;
            }
            (AesMode::Cbc, CipherOp::Decrypt) => {
                self.key.decrypt_block(&mut b);
                xor_into(&mut b, &self.prev);
                self.prev = *input;
            }
            (AesMode::Pcbc, CipherOp::Encrypt) => {
                xor_into(&mut b, &self.prev);
                self.key.encrypt_block(&mut b);
                self.prev = xor_of(input, &b);
            }
            (AesMode::Pcbc, CipherOp::Decrypt) => {
                self.key.decrypt_block(&mut b);
                xor_into(&mut b, &self.prev);
                self.prev = xor_of(&b, input);
            }
            (AesMode::Cfb, CipherOp::Encrypt) => {
                let mut stream = self.prev;
                self.key.encrypt_block(&mut stream);
                xor_into(&mut b, &stream);
                self.prev = b;
            }
            (AesMode::Cfb, CipherOp::Decrypt) => {
                let mut stream = self.prev;
                self.key.encrypt_block(&mut stream);
                self.prev = *input;
                xor_into(&mut b, &stream);
            }
            (AesMode::Ofb, _) => {
                let mut stream = self.prev;
                self.key.encrypt_block(&mut stream);
                self.prev = stream;
                xor_into(&mut b, &stream);
            }
        }
        b
    }

    /// Pull one whole block from the inner stream. `Ok(false)` at a clean
    /// or partial tail: a trailing fragment is never served.
    fn refill(&mut self) -> Result<bool> {
        let mut block = [0u8; BLOCK];
        let mut got = 0;
        while got < BLOCK {
            let n = self.inner.read(&mut block[got..])?;
            if n == 0 {
                return Ok(false);
            }
            got += n;
        }
        self.out = self.process(&block);
        self.out_pos = 0;
        self.out_len = BLOCK;
        Ok(true)
    }
}

fn xor_into(dst: &mut [u8; BLOCK], src: &[u8; BLOCK]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }
}

fn xor_of(a: &[u8; BLOCK], b: &[u8; BLOCK]) -> [u8; BLOCK] {
    let mut out = *a;
    xor_into(&mut out, b);
    out
}

impl Device for AesFilter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            if self.out_pos == self.out_len {
                if !self.refill()? {
                    break;
                }
            }
            let take = (buf.len() - n).min(self.out_len - self.out_pos);
            buf[n..n + take].copy_from_slice(&self.out[self.out_pos..self.out_pos + take]);
            self.out_pos += take;
            n += take;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut off = 0;
        while off < buf.len() {
            let take = (buf.len() - off).min(BLOCK - self.staged_len);
            self.staged[self.staged_len..self.staged_len + take]
                .copy_from_slice(&buf[off..off + take]);
            self.staged_len += take;
            off += take;
            if self.staged_len == BLOCK {
                let block = self.staged;
                let out = self.process(&block);
                self.inner.write_all(&out)?;
                self.staged_len = 0;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        // Whole blocks only; a staged fragment stays put.
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        // The trailing partial block is not emitted; a padding filter
        // below this one guarantees there is none.
        Ok(())
    }

    fn describe(&self) -> &'static str {
        match self.op {
            CipherOp::Encrypt => "aes_encrypt",
            CipherOp::Decrypt => "aes_decrypt",
        }
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write()
    }
}

// ---------------------------------------------------------------------------
// Stream constructors
// ---------------------------------------------------------------------------

impl Stream {
    /// AES encryption filter over `inner`.
    pub fn aes_encrypt(
        inner: &Stream,
        key: &[u8],
        aes_mode: AesMode,
        iv: Option<[u8; BLOCK]>,
        mode: &str,
    ) -> Result<Stream> {
        Stream::custom(
            AesFilter::new(inner.clone(), key, aes_mode, CipherOp::Encrypt, iv)?,
            mode,
        )
    }

    /// AES decryption filter over `inner`.
    pub fn aes_decrypt(
        inner: &Stream,
        key: &[u8],
        aes_mode: AesMode,
        iv: Option<[u8; BLOCK]>,
        mode: &str,
    ) -> Result<Stream> {
        Stream::custom(
            AesFilter::new(inner.clone(), key, aes_mode, CipherOp::Decrypt, iv)?,
            mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::device::SeekFrom;

    const KEY_128: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];
    const IV: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f,
    ];
    // SP800-38A F.2.1 CBC-AES128 block 1.
    const PLAIN: [u8; 16] = [
        0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17,
        0x2a,
    ];
    const CBC_CIPHER: [u8; 16] = [
        0x76, 0x49, 0xab, 0xac, 0x81, 0x19, 0xb2, 0x46, 0xce, 0xe9, 0x8e, 0x9b, 0x12, 0xe9, 0x19,
        0x7d,
    ];

    fn encrypt_via_stream(mode: AesMode, iv: Option<[u8; 16]>, plain: &[u8]) -> Vec<u8> {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let enc = Stream::aes_encrypt(&sink, &KEY_128, mode, iv, "wb").unwrap();
        enc.write_all(plain).unwrap();
        enc.close().unwrap();
        sink.contents().unwrap()
    }

    fn decrypt_via_stream(mode: AesMode, iv: Option<[u8; 16]>, cipher: &[u8]) -> Vec<u8> {
        let src = Stream::dynamic_buffer_with(cipher.to_vec(), "rb").unwrap();
        let dec = Stream::aes_decrypt(&src, &KEY_128, mode, iv, "rb").unwrap();
        let mut out = vec![0u8; cipher.len()];
        let n = dec.read(&mut out).unwrap();
        out.truncate(n);
        out
    }

    #[test]
    fn test_cbc_known_answer() {
        let cipher = encrypt_via_stream(AesMode::Cbc, Some(IV), &PLAIN);
        assert_eq!(cipher, CBC_CIPHER);
    }

    #[test]
    fn test_cfb_and_ofb_known_answer() {
        // SP800-38A F.3.13 / F.5.1: the first CFB and OFB blocks agree,
        // both being E(IV) xor P1.
        let expect = [
            0x3b, 0x3f, 0xd9, 0x2e, 0xb7, 0x2d, 0xad, 0x20, 0x33, 0x34, 0x49, 0xf8, 0xe8, 0x3c,
            0xfb, 0x4a,
        ];
        let cfb = encrypt_via_stream(AesMode::Cfb, Some(IV), &PLAIN);
        assert_eq!(cfb, expect);
        let ofb = encrypt_via_stream(AesMode::Ofb, Some(IV), &PLAIN);
        assert_eq!(ofb, expect);
    }

    #[test]
    fn test_all_modes_roundtrip() {
        let plain: Vec<u8> = (0u8..64).collect();
        for mode in [
            AesMode::Ecb,
            AesMode::Cbc,
            AesMode::Pcbc,
            AesMode::Cfb,
            AesMode::Ofb,
        ] {
            let iv = if mode == AesMode::Ecb { None } else { Some(IV) };
            let cipher = encrypt_via_stream(mode, iv, &plain);
            assert_eq!(cipher.len(), 64);
            let back = decrypt_via_stream(mode, iv, &cipher);
            assert_eq!(back, plain, "mode {mode:?}");
        }
    }

    #[test]
    fn test_all_key_lengths_roundtrip() {
        let plain: Vec<u8> = (0u8..32).collect();
        for key_len in [16usize, 24, 32] {
            let key: Vec<u8> = (0..key_len as u8).collect();
            let sink = Stream::dynamic_buffer("r+b").unwrap();
            let enc = Stream::aes_encrypt(&sink, &key, AesMode::Cbc, Some(IV), "wb").unwrap();
            enc.write_all(&plain).unwrap();
            enc.close().unwrap();
            let cipher = sink.contents().unwrap();

            sink.seek(SeekFrom::Start(0)).unwrap();
            let dec = Stream::aes_decrypt(&sink, &key, AesMode::Cbc, Some(IV), "rb").unwrap();
            let mut out = vec![0u8; cipher.len()];
            let n = dec.read(&mut out).unwrap();
            assert_eq!(&out[..n], &plain[..]);
        }
    }

    #[test]
    fn test_partial_block_held_back() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let enc = Stream::aes_encrypt(&sink, &KEY_128, AesMode::Ecb, None, "wb").unwrap();
        enc.write_all(&[0u8; 20]).unwrap();
        enc.close().unwrap();
        // Only the first whole block was emitted.
        assert_eq!(sink.contents().unwrap().len(), 16);
    }

    #[test]
    fn test_missing_iv_rejected() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        assert!(Stream::aes_encrypt(&sink, &KEY_128, AesMode::Cbc, None, "wb").is_err());
        assert!(Stream::aes_encrypt(&sink, &KEY_128, AesMode::Ecb, Some(IV), "wb").is_err());
    }

    #[test]
    fn test_cfb_decrypt_uses_forward_cipher() {
        // If decrypt mistakenly used the inverse cipher the round-trip
        // would not close.
        let plain = [0x5au8; 48];
        let cipher = encrypt_via_stream(AesMode::Cfb, Some(IV), &plain);
        let back = decrypt_via_stream(AesMode::Cfb, Some(IV), &cipher);
        assert_eq!(back, plain);
        assert_ne!(cipher, plain);
    }
}
