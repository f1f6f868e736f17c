//! zlib / gzip / raw-deflate filters (RFC 1950/1952/1951).
//!
//! The codec state machine comes from flate2; this filter owns the
//! plumbing between it and the inner stream through a 4 KiB shuttle
//! buffer. Window-bits follow the zlib sign convention: positive means
//! zlib framing, negative means raw deflate, +16 means gzip, and +32 on
//! inflate auto-detects gzip-or-zlib from the first byte.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::core::Stream;
use crate::stream::device::{Caps, Device};

/// Shuttle buffer size between the codec state and the inner stream.
const SHUTTLE: usize = 4096;

/// Open parameters.
#[derive(Debug, Clone, Copy)]
pub struct ZlibParams {
    /// Compression level 0..=9 (deflate only).
    pub level: u32,
    /// Signed window-bits with the zlib framing convention.
    pub window_bits: i32,
    /// Accepted for parity with the underlying library; the safe codec
    /// API exposes no mem-level knob.
    pub mem_level: u32,
    /// Accepted for parity; the safe codec API exposes no strategy knob.
    pub strategy: u32,
}

impl Default for ZlibParams {
    fn default() -> Self {
        Self {
            level: 6,
            window_bits: 15,
            mem_level: 8,
            strategy: 0,
        }
    }
}

/// Decoded framing choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Zlib(u8),
    Raw(u8),
    Gzip(u8),
    /// Inflate only: decide zlib-vs-gzip from the first input byte.
    Auto(u8),
}

fn parse_window_bits(wb: i32, inflate: bool) -> Result<Framing> {
    match wb {
        9..=15 => Ok(Framing::Zlib(wb as u8)),
        -15..=-9 => Ok(Framing::Raw((-wb) as u8)),
        25..=31 => Ok(Framing::Gzip((wb - 16) as u8)),
        41..=47 if inflate => Ok(Framing::Auto((wb - 32) as u8)),
        _ => Err(StreamError::new(
            ErrorKind::InvalidArgument,
            "window bits outside the supported ranges",
        )),
    }
}

enum Codec {
    Deflate(Compress),
    Inflate(Decompress),
    /// Deferred until the first input byte reveals the framing.
    PendingAuto(u8),
}

/// Deflate-or-inflate filter device.
pub struct ZlibFilter {
    inner: Stream,
    codec: Codec,
    deflating: bool,
    /// Compressed-side staging pulled from the inner stream on reads.
    in_buf: Vec<u8>,
    in_pos: usize,
    inner_eof: bool,
    stream_end: bool,
    /// Whether any bytes went through the write path.
    wrote: bool,
    finished_on_close: bool,
}

impl ZlibFilter {
    /// Deflate filter over `inner`.
    pub fn deflate(inner: Stream, params: ZlibParams) -> Result<Self> {
        if params.level > 9 {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "level must be 0..=9",
            ));
        }
        let level = Compression::new(params.level);
        let codec = match parse_window_bits(params.window_bits, false)? {
            Framing::Zlib(wb) => Compress::new_with_window_bits(level, true, wb),
            Framing::Raw(wb) => Compress::new_with_window_bits(level, false, wb),
            Framing::Gzip(wb) => Compress::new_gzip(level, wb),
            Framing::Auto(_) => unreachable!("auto framing is inflate-only"),
        };
        Ok(Self {
            inner,
            codec: Codec::Deflate(codec),
            deflating: true,
            in_buf: Vec::new(),
            in_pos: 0,
            inner_eof: false,
            stream_end: false,
            wrote: false,
            finished_on_close: false,
        })
    }

    /// Inflate filter over `inner`.
    pub fn inflate(inner: Stream, params: ZlibParams) -> Result<Self> {
        let codec = match parse_window_bits(params.window_bits, true)? {
            Framing::Zlib(wb) => Codec::Inflate(Decompress::new_with_window_bits(true, wb)),
            Framing::Raw(wb) => Codec::Inflate(Decompress::new_with_window_bits(false, wb)),
            Framing::Gzip(wb) => Codec::Inflate(Decompress::new_gzip(wb)),
            Framing::Auto(wb) => Codec::PendingAuto(wb),
        };
        Ok(Self {
            inner,
            codec,
            deflating: false,
            in_buf: Vec::new(),
            in_pos: 0,
            inner_eof: false,
            stream_end: false,
            wrote: false,
            finished_on_close: false,
        })
    }

    /// Resolve gzip-vs-zlib once the first compressed byte is visible.
    fn resolve_auto(&mut self, first: u8) {
        if let Codec::PendingAuto(wb) = self.codec {
            let codec = if first == 0x1f {
                Decompress::new_gzip(wb)
            } else {
                Decompress::new_with_window_bits(true, wb)
            };
            self.codec = Codec::Inflate(codec);
        }
    }

    fn refill(&mut self) -> Result<()> {
        if self.inner_eof || self.in_pos < self.in_buf.len() {
            return Ok(());
        }
        let mut chunk = [0u8; SHUTTLE];
        let n = self.inner.read(&mut chunk)?;
        if n == 0 {
            self.inner_eof = true;
        } else {
            self.in_buf.clear();
            self.in_pos = 0;
            self.in_buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    /// One codec step: consume staged input, produce into `out`.
    /// Returns (consumed, produced).
    fn step(&mut self, out: &mut [u8], finish: bool) -> Result<(usize, usize)> {
        let input = &self.in_buf[self.in_pos..];
        match &mut self.codec {
            Codec::Deflate(c) => {
                let before_in = c.total_in();
                let before_out = c.total_out();
                let flush = if finish {
                    FlushCompress::Finish
                } else {
                    FlushCompress::None
                };
                let status = c.compress(input, out, flush).map_err(|_| {
                    StreamError::new(ErrorKind::Io, "deflate state failure")
                })?;
                if status == Status::StreamEnd {
                    self.stream_end = true;
                }
                Ok((
                    (c.total_in() - before_in) as usize,
                    (c.total_out() - before_out) as usize,
                ))
            }
            Codec::Inflate(c) => {
                let before_in = c.total_in();
                let before_out = c.total_out();
                let flush = if finish {
                    FlushDecompress::Finish
                } else {
                    FlushDecompress::None
                };
                let status = c.decompress(input, out, flush).map_err(|_| {
                    StreamError::new(ErrorKind::BadMessage, "corrupt compressed data")
                })?;
                if status == Status::StreamEnd {
                    self.stream_end = true;
                }
                Ok((
                    (c.total_in() - before_in) as usize,
                    (c.total_out() - before_out) as usize,
                ))
            }
            Codec::PendingAuto(_) => Ok((0, 0)),
        }
    }
}

impl Device for ZlibFilter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        loop {
            if self.stream_end || n == buf.len() {
                return Ok(n);
            }
            self.refill()?;
            if matches!(self.codec, Codec::PendingAuto(_)) {
                match self.in_buf.get(self.in_pos).copied() {
                    Some(first) => self.resolve_auto(first),
                    None if self.inner_eof => return Ok(n),
                    None => continue,
                }
            }
            let finish = self.inner_eof;
            let (consumed, produced) = self.step(&mut buf[n..], finish)?;
            self.in_pos += consumed;
            n += produced;
            if produced == 0 && consumed == 0 {
                if self.inner_eof {
                    // Nothing left to pump; a deflate read finalizes, an
                    // inflate read at a clean boundary is simply done.
                    return Ok(n);
                }
                if self.in_pos < self.in_buf.len() {
                    return Err(StreamError::new(
                        ErrorKind::Io,
                        "codec made no progress",
                    ));
                }
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.wrote = true;
        if let Some(&first) = buf.first() {
            self.resolve_auto(first);
        }
        let mut consumed_total = 0;
        let mut shuttle = [0u8; SHUTTLE];
        while consumed_total < buf.len() {
            self.in_buf.clear();
            self.in_pos = 0;
            self.in_buf.extend_from_slice(&buf[consumed_total..]);
            let (consumed, produced) = self.step(&mut shuttle, false)?;
            self.in_pos += consumed;
            consumed_total += consumed;
            if produced > 0 {
                self.inner.write_all(&shuttle[..produced])?;
            }
            if consumed == 0 && produced == 0 {
                return Err(StreamError::new(
                    ErrorKind::Io,
                    "codec made no progress",
                ));
            }
        }
        self.in_buf.clear();
        self.in_pos = 0;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        // Finish the stream with a zero-length finalize on the write path.
        if self.wrote && !self.finished_on_close {
            self.finished_on_close = true;
            self.in_buf.clear();
            self.in_pos = 0;
            let mut shuttle = [0u8; SHUTTLE];
            while !self.stream_end {
                let (_, produced) = self
                    .step(&mut shuttle, true)
                    .map_err(|_| StreamError::new(ErrorKind::Io, "finalize failed"))?;
                if produced > 0 {
                    self.inner.write_all(&shuttle[..produced])?;
                } else if !self.stream_end {
                    break;
                }
            }
        }
        Ok(())
    }

    fn describe(&self) -> &'static str {
        if self.deflating {
            "zlib_deflate"
        } else {
            "zlib_inflate"
        }
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write()
    }
}

impl Stream {
    /// Deflate filter over `inner`.
    pub fn zlib_deflate(inner: &Stream, params: ZlibParams, mode: &str) -> Result<Stream> {
        Stream::custom(ZlibFilter::deflate(inner.clone(), params)?, mode)
    }

    /// Inflate filter over `inner`.
    pub fn zlib_inflate(inner: &Stream, params: ZlibParams, mode: &str) -> Result<Stream> {
        Stream::custom(ZlibFilter::inflate(inner.clone(), params)?, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deflate_bytes(data: &[u8], params: ZlibParams) -> Vec<u8> {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let z = Stream::zlib_deflate(&sink, params, "wb").unwrap();
        z.write_all(data).unwrap();
        z.close().unwrap();
        sink.contents().unwrap()
    }

    fn inflate_bytes(data: &[u8], params: ZlibParams) -> Vec<u8> {
        let src = Stream::dynamic_buffer_with(data.to_vec(), "rb").unwrap();
        let z = Stream::zlib_inflate(&src, params, "rb").unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = z.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    #[test]
    fn test_zlib_roundtrip() {
        let data = b"compress me, then give me back".repeat(50);
        let packed = deflate_bytes(&data, ZlibParams::default());
        assert!(packed.len() < data.len());
        // RFC 1950 header: 0x78 for 32K window.
        assert_eq!(packed[0], 0x78);
        let back = inflate_bytes(&packed, ZlibParams::default());
        assert_eq!(back, data);
    }

    #[test]
    fn test_gzip_roundtrip() {
        let params = ZlibParams {
            window_bits: 31,
            ..ZlibParams::default()
        };
        let data = b"gzip framing please".repeat(20);
        let packed = deflate_bytes(&data, params);
        // RFC 1952 magic.
        assert_eq!(&packed[..2], &[0x1f, 0x8b]);
        let back = inflate_bytes(&packed, params);
        assert_eq!(back, data);
    }

    #[test]
    fn test_raw_deflate_roundtrip() {
        let params = ZlibParams {
            window_bits: -15,
            ..ZlibParams::default()
        };
        let data = vec![0x42u8; 10_000];
        let packed = deflate_bytes(&data, params);
        let back = inflate_bytes(&packed, params);
        assert_eq!(back, data);
    }

    #[test]
    fn test_auto_detect_inflate() {
        let auto = ZlibParams {
            window_bits: 47,
            ..ZlibParams::default()
        };
        let data = b"either framing should inflate".to_vec();

        let zlib_packed = deflate_bytes(&data, ZlibParams::default());
        assert_eq!(inflate_bytes(&zlib_packed, auto), data);

        let gzip_packed = deflate_bytes(
            &data,
            ZlibParams {
                window_bits: 31,
                ..ZlibParams::default()
            },
        );
        assert_eq!(inflate_bytes(&gzip_packed, auto), data);
    }

    #[test]
    fn test_levels_roundtrip() {
        let data = b"abcabcabcabc".repeat(100);
        for level in [0u32, 1, 6, 9] {
            let params = ZlibParams {
                level,
                ..ZlibParams::default()
            };
            let packed = deflate_bytes(&data, params);
            assert_eq!(inflate_bytes(&packed, ZlibParams::default()), data);
        }
    }

    #[test]
    fn test_corrupt_input_is_bad_message() {
        let src = Stream::dynamic_buffer_with(vec![0x78, 0x9c, 0xff, 0xff, 0xff], "rb").unwrap();
        let z = Stream::zlib_inflate(&src, ZlibParams::default(), "rb").unwrap();
        let mut out = [0u8; 64];
        let err = z.read(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMessage);
    }

    #[test]
    fn test_bad_window_bits_rejected() {
        let sink = Stream::dynamic_buffer("wb").unwrap();
        let bad = ZlibParams {
            window_bits: 8,
            ..ZlibParams::default()
        };
        assert!(Stream::zlib_deflate(&sink, bad, "wb").is_err());
        // Auto framing is inflate-only.
        let auto = ZlibParams {
            window_bits: 47,
            ..ZlibParams::default()
        };
        assert!(Stream::zlib_deflate(&sink, auto, "wb").is_err());
    }

    #[test]
    fn test_megabyte_of_zeros() {
        let data = vec![0u8; 1 << 20];
        let params = ZlibParams {
            window_bits: 31,
            ..ZlibParams::default()
        };
        let packed = deflate_bytes(&data, params);
        assert!(packed.len() < 4096);
        let back = inflate_bytes(&packed, params);
        assert_eq!(back.len(), 1 << 20);
        assert!(back.iter().all(|&b| b == 0));
    }
}
