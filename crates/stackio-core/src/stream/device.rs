//! The device seam.
//!
//! A device is anything that can source or sink bytes: a file, a memory
//! buffer, or a codec filter wrapping another stream. The stream core
//! layers the cross-cutting concerns (directional state, sticky flags,
//! push-back, text mode, buffering) on top of this trait, so a device
//! implementation only deals in raw bytes.
//!
//! Every operation other than `read`/`write`/`describe`/`capabilities`
//! has a default that reports NotSupported (or succeeds trivially), so a
//! minimal device implements exactly what it can do — absent operations
//! surface as "not supported" errors at the stream surface.

use std::time::Duration;

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::state::Direction;

/// Seek origin plus offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    /// Absolute offset from the start.
    Start(u64),
    /// Signed offset from the current position.
    Current(i64),
    /// Signed offset from the end.
    End(i64),
}

/// Which half of a bidirectional handle to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownHow {
    Read,
    Write,
    Both,
}

/// What a device can inherently do, before mode flags narrow it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Caps {
    pub readable: bool,
    pub writable: bool,
    pub seekable: bool,
    /// Push-back of NUL bytes is rejected (read-only C-string source).
    pub reject_nul_pushback: bool,
}

impl Caps {
    /// Read-only device capabilities.
    pub fn read_only() -> Self {
        Caps {
            readable: true,
            ..Caps::default()
        }
    }

    /// Write-only device capabilities.
    pub fn write_only() -> Self {
        Caps {
            writable: true,
            ..Caps::default()
        }
    }

    /// Read+write device capabilities.
    pub fn read_write() -> Self {
        Caps {
            readable: true,
            writable: true,
            ..Caps::default()
        }
    }

    /// Enable seeking.
    pub fn seekable(mut self) -> Self {
        self.seekable = true;
        self
    }
}

/// A byte source/sink behind a stream.
pub trait Device {
    /// Read into `buf`, returning the byte count. `Ok(0)` means eof.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write from `buf`, returning the byte count actually accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Reposition; returns the new absolute position.
    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(StreamError::new(
            ErrorKind::SeekNotSupported,
            "device cannot seek",
        ))
    }

    /// Current absolute position, for seekable devices.
    fn tell(&mut self) -> Result<u64> {
        Err(StreamError::new(
            ErrorKind::SeekNotSupported,
            "device cannot report position",
        ))
    }

    /// Push any internal pending state toward the sink.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release owned resources and finalize (codecs emit trailers here).
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Shut down one or both halves of a bidirectional handle.
    fn shutdown(&mut self, _how: ShutdownHow) -> Result<()> {
        Err(StreamError::new(
            ErrorKind::NotSupported,
            "device cannot shut down",
        ))
    }

    /// Total size in bytes, where meaningful.
    fn size(&mut self) -> Result<u64> {
        Err(StreamError::new(
            ErrorKind::NotSupported,
            "device has no size",
        ))
    }

    /// Truncate or extend to `len` bytes.
    fn truncate(&mut self, _len: u64) -> Result<()> {
        Err(StreamError::new(
            ErrorKind::NotSupported,
            "device cannot truncate",
        ))
    }

    /// Set the read timeout on a socket-backed handle.
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Err(StreamError::new(
            ErrorKind::NotSupported,
            "device has no read timeout",
        ))
    }

    /// Set the write timeout on a socket-backed handle.
    fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Err(StreamError::new(
            ErrorKind::NotSupported,
            "device has no write timeout",
        ))
    }

    /// Hook invoked when the stream commits a direction change. Stateful
    /// codecs reset per-direction scratch here.
    fn switch_direction(&mut self, _to: Direction) -> Result<()> {
        Ok(())
    }

    /// Hook invoked when the stream's sticky indicators are cleared, so
    /// a device can drop its own failed state.
    fn clear_err(&mut self) {}

    /// Machine-readable type tag (`"file"`, `"hex_encode"`, ...).
    fn describe(&self) -> &'static str;

    /// Inherent capabilities.
    fn capabilities(&self) -> Caps;

    /// Borrow the accumulated bytes of a memory-backed device.
    fn contents(&self) -> Option<&[u8]> {
        None
    }
}
