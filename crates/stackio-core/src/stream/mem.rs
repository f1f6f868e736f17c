//! Memory-backed devices.
//!
//! Five variants:
//! - `empty`: zero-length read-only source.
//! - `cstring`: read-only view of a NUL-terminated byte string; the
//!   logical length stops at the first NUL (or the slice end).
//! - `sized_buffer`: caller-sized array; writes past the boundary fail
//!   with NoBufferSpace, contents up to the boundary are kept.
//! - `minimal_buffer`: growable, grows exactly to the bytes required.
//! - `dynamic_buffer`: growable, grows by max(needed, 1.5x capacity, 16).
//!
//! Both growables support append pinning and zero-fill of the gap when a
//! seek moved the position past the current size before a write.

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::device::{Caps, Device, SeekFrom};

// ---------------------------------------------------------------------------
// Empty
// ---------------------------------------------------------------------------

/// Zero-length read-only stream.
#[derive(Debug, Default)]
pub struct EmptyDevice;

impl Device for EmptyDevice {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(StreamError::new(
            ErrorKind::NotSupported,
            "empty stream is read-only",
        ))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match pos {
            SeekFrom::Start(0) | SeekFrom::Current(0) | SeekFrom::End(0) => Ok(0),
            _ => Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "empty stream has no interior",
            )),
        }
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(0)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(0)
    }

    fn describe(&self) -> &'static str {
        "empty"
    }

    fn capabilities(&self) -> Caps {
        Caps::read_only().seekable()
    }
}

// ---------------------------------------------------------------------------
// CString
// ---------------------------------------------------------------------------

/// Read-only view over a NUL-terminated byte string.
#[derive(Debug)]
pub struct CStrDevice {
    data: Vec<u8>,
    /// Logical length: index of the first NUL, or the full length.
    len: usize,
    pos: usize,
}

impl CStrDevice {
    /// Wrap a byte string; the stream ends at the first NUL byte.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        Self { data, len, pos: 0 }
    }
}

impl Device for CStrDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let avail = self.len.saturating_sub(self.pos);
        let take = avail.min(buf.len());
        buf[..take].copy_from_slice(&self.data[self.pos..self.pos + take]);
        self.pos += take;
        Ok(take)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(StreamError::new(
            ErrorKind::NotSupported,
            "cstring stream is read-only",
        ))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.pos as u64, self.len as u64)?;
        if target > self.len as u64 {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "seek past end of cstring",
            ));
        }
        self.pos = target as usize;
        Ok(target)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.len as u64)
    }

    fn describe(&self) -> &'static str {
        "cstring"
    }

    fn capabilities(&self) -> Caps {
        let mut caps = Caps::read_only().seekable();
        caps.reject_nul_pushback = true;
        caps
    }

    fn contents(&self) -> Option<&[u8]> {
        Some(&self.data[..self.len])
    }
}

// ---------------------------------------------------------------------------
// Sized buffer
// ---------------------------------------------------------------------------

/// Fixed-size read/write buffer. Writes stop at the boundary.
#[derive(Debug)]
pub struct SizedBufDevice {
    data: Vec<u8>,
    pos: usize,
}

impl SizedBufDevice {
    /// Wrap a caller-sized array; its length is the stream size.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl Device for SizedBufDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let avail = self.data.len().saturating_sub(self.pos);
        let take = avail.min(buf.len());
        buf[..take].copy_from_slice(&self.data[self.pos..self.pos + take]);
        self.pos += take;
        Ok(take)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let space = self.data.len().saturating_sub(self.pos);
        if space == 0 && !buf.is_empty() {
            return Err(StreamError::new(
                ErrorKind::NoBufferSpace,
                "sized buffer is full",
            ));
        }
        let take = space.min(buf.len());
        self.data[self.pos..self.pos + take].copy_from_slice(&buf[..take]);
        self.pos += take;
        Ok(take)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.pos as u64, self.data.len() as u64)?;
        if target > self.data.len() as u64 {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "seek past end of sized buffer",
            ));
        }
        self.pos = target as usize;
        Ok(target)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn describe(&self) -> &'static str {
        "sized_buffer"
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write().seekable()
    }

    fn contents(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}

// ---------------------------------------------------------------------------
// Growable buffers
// ---------------------------------------------------------------------------

/// Growth policy for a growable buffer device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// Grow exactly to the bytes required.
    Minimal,
    /// Grow by max(needed, 1.5x current capacity, 16-byte floor).
    Amortized,
}

/// Floor for amortized growth.
const GROW_FLOOR: usize = 16;

/// Growable in-memory buffer.
#[derive(Debug)]
pub struct GrowableBufDevice {
    data: Vec<u8>,
    pos: usize,
    growth: Growth,
    /// Writes are pinned to the current logical size.
    append: bool,
}

impl GrowableBufDevice {
    /// Empty growable buffer with the given policy.
    pub fn new(growth: Growth, append: bool) -> Self {
        Self {
            data: Vec::new(),
            pos: 0,
            growth,
            append,
        }
    }

    /// Growable buffer seeded with initial contents.
    pub fn with_contents(growth: Growth, append: bool, data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            growth,
            append,
        }
    }

    /// Current heap capacity (growth-policy observable).
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    fn ensure_capacity(&mut self, end: usize) {
        if end <= self.data.capacity() {
            return;
        }
        let want = match self.growth {
            Growth::Minimal => end,
            Growth::Amortized => {
                let cap = self.data.capacity();
                end.max(cap + cap / 2).max(GROW_FLOOR)
            }
        };
        self.data.reserve_exact(want - self.data.len());
    }
}

impl Device for GrowableBufDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let avail = self.data.len().saturating_sub(self.pos);
        let take = avail.min(buf.len());
        buf[..take].copy_from_slice(&self.data[self.pos..self.pos + take]);
        self.pos += take;
        Ok(take)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.append {
            self.pos = self.data.len();
        }
        let end = self.pos + buf.len();
        self.ensure_capacity(end);
        // Zero-fill the gap left by a seek past the current size.
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(buf.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        // Positions beyond the current size are allowed; the gap is
        // zero-filled by the next write.
        let target = resolve_seek(pos, self.pos as u64, self.data.len() as u64)?;
        self.pos = target as usize;
        Ok(target)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.data.truncate(len as usize);
        self.pos = self.pos.min(self.data.len());
        Ok(())
    }

    fn describe(&self) -> &'static str {
        match self.growth {
            Growth::Minimal => "minimal_buffer",
            Growth::Amortized => "dynamic_buffer",
        }
    }

    fn capabilities(&self) -> Caps {
        Caps::read_write().seekable()
    }

    fn contents(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}

// ---------------------------------------------------------------------------
// Shared seek arithmetic
// ---------------------------------------------------------------------------

/// Resolve a seek target against current position and size.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, size: u64) -> Result<u64> {
    let target = match pos {
        SeekFrom::Start(p) => Some(p),
        SeekFrom::Current(d) => current.checked_add_signed(d),
        SeekFrom::End(d) => size.checked_add_signed(d),
    };
    target.ok_or_else(|| StreamError::new(ErrorKind::InvalidArgument, "seek before start"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_reads_eof() {
        let mut d = EmptyDevice;
        let mut buf = [0u8; 4];
        assert_eq!(d.read(&mut buf).unwrap(), 0);
        assert_eq!(d.size().unwrap(), 0);
    }

    #[test]
    fn test_cstring_stops_at_nul() {
        let mut d = CStrDevice::new(&b"abc\0def"[..]);
        let mut buf = [0u8; 16];
        let n = d.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abc");
        assert_eq!(d.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_cstring_seek_and_size() {
        let mut d = CStrDevice::new(&b"hello"[..]);
        assert_eq!(d.size().unwrap(), 5);
        assert_eq!(d.seek(SeekFrom::Start(3)).unwrap(), 3);
        let mut buf = [0u8; 8];
        let n = d.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"lo");
        assert!(d.seek(SeekFrom::Start(9)).is_err());
    }

    #[test]
    fn test_sized_buffer_write_boundary() {
        let mut d = SizedBufDevice::new(vec![0u8; 4]);
        assert_eq!(d.write(b"abcdef").unwrap(), 4);
        let err = d.write(b"g").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoBufferSpace);
        assert_eq!(d.contents().unwrap(), b"abcd");
    }

    #[test]
    fn test_sized_buffer_position_bounded() {
        let mut d = SizedBufDevice::new(vec![0u8; 4]);
        assert!(d.seek(SeekFrom::Start(5)).is_err());
        assert_eq!(d.seek(SeekFrom::End(0)).unwrap(), 4);
    }

    #[test]
    fn test_minimal_growth_is_exact() {
        let mut d = GrowableBufDevice::new(Growth::Minimal, false);
        d.write(b"abc").unwrap();
        assert_eq!(d.capacity(), 3);
        d.write(b"de").unwrap();
        assert_eq!(d.capacity(), 5);
        assert_eq!(d.contents().unwrap(), b"abcde");
    }

    #[test]
    fn test_amortized_growth_floor() {
        let mut d = GrowableBufDevice::new(Growth::Amortized, false);
        d.write(b"a").unwrap();
        assert!(d.capacity() >= GROW_FLOOR);
    }

    #[test]
    fn test_amortized_growth_factor() {
        let mut d = GrowableBufDevice::new(Growth::Amortized, false);
        d.write(&vec![0u8; 100]).unwrap();
        let cap_before = d.capacity();
        d.write(&[1u8]).unwrap();
        if d.capacity() > cap_before {
            assert!(d.capacity() >= cap_before + cap_before / 2);
        }
    }

    #[test]
    fn test_growable_seek_gap_zero_filled() {
        let mut d = GrowableBufDevice::new(Growth::Minimal, false);
        d.write(b"ab").unwrap();
        d.seek(SeekFrom::Start(5)).unwrap();
        d.write(b"z").unwrap();
        assert_eq!(d.contents().unwrap(), b"ab\0\0\0z");
    }

    #[test]
    fn test_append_pins_writes_to_size() {
        let mut d = GrowableBufDevice::new(Growth::Minimal, true);
        d.write(b"abc").unwrap();
        d.seek(SeekFrom::Start(0)).unwrap();
        d.write(b"d").unwrap();
        assert_eq!(d.contents().unwrap(), b"abcd");
    }

    #[test]
    fn test_growable_read_back() {
        let mut d = GrowableBufDevice::new(Growth::Amortized, false);
        d.write(b"hello").unwrap();
        d.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = [0u8; 8];
        let n = d.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_growable_truncate() {
        let mut d = GrowableBufDevice::new(Growth::Minimal, false);
        d.write(b"hello").unwrap();
        d.truncate(2).unwrap();
        assert_eq!(d.contents().unwrap(), b"he");
    }
}
