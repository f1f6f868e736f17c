//! File-backed devices.
//!
//! Ownership is decided at construction: owned handles are closed with
//! the stream, borrowed handles are duplicated at the OS level so the
//! caller's descriptor is never touched. All four native tags map onto
//! one device type.
//!
//! Timeouts and shutdown are surfaced as NotSupported here; they only
//! apply to socket-backed custom devices.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::device::{Caps, Device, SeekFrom};
use crate::stream::mode::OpenFlags;

/// How the device came to hold its file handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOrigin {
    /// Opened from a path; closed with the stream.
    Owned,
    /// Duplicated from a caller's `File`; the caller's handle stays open.
    Borrowed,
    /// Adopted from a caller's native descriptor (`g` mode flag).
    OwnedNative,
    /// Duplicated from a caller's native descriptor.
    BorrowedNative,
}

/// File device.
#[derive(Debug)]
pub struct FileDevice {
    file: Option<File>,
    origin: HandleOrigin,
    flags: OpenFlags,
}

impl FileDevice {
    /// Open a file at `path` per the mode flags.
    pub fn open(path: &Path, flags: OpenFlags) -> Result<Self> {
        if !flags.readable && !flags.writable {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "mode grants no capabilities",
            ));
        }
        let mut opts = OpenOptions::new();
        opts.read(flags.readable).write(flags.writable);
        if flags.append {
            opts.append(true);
        }
        if flags.exclusive {
            opts.create_new(true);
        } else if flags.create {
            opts.create(true);
        }
        if flags.truncate {
            opts.truncate(true);
        }
        let file = opts.open(path).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::AlreadyExists {
                ErrorKind::AlreadyOpen
            } else {
                ErrorKind::Io
            };
            StreamError::with_source(kind, "open failed", e)
        })?;
        Ok(Self {
            file: Some(file),
            origin: HandleOrigin::Owned,
            flags,
        })
    }

    /// Adopt an already-open file. The stream closes it.
    pub fn adopt(file: File, flags: OpenFlags, origin: HandleOrigin) -> Self {
        Self {
            file: Some(file),
            origin,
            flags,
        }
    }

    /// Duplicate a caller's handle. The caller's handle is never closed.
    pub fn duplicate(file: &File, flags: OpenFlags, origin: HandleOrigin) -> Result<Self> {
        let dup = file
            .try_clone()
            .map_err(|e| StreamError::with_source(ErrorKind::Io, "handle dup failed", e))?;
        Ok(Self {
            file: Some(dup),
            origin,
            flags,
        })
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| StreamError::new(ErrorKind::InvalidArgument, "file already closed"))
    }
}

impl Device for FileDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let f = self.file_mut()?;
        f.read(buf)
            .map_err(|e| StreamError::with_source(ErrorKind::Io, "file read failed", e))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let f = self.file_mut()?;
        f.write(buf)
            .map_err(|e| StreamError::with_source(ErrorKind::Io, "file write failed", e))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let f = self.file_mut()?;
        let std_pos = match pos {
            SeekFrom::Start(p) => std::io::SeekFrom::Start(p),
            SeekFrom::Current(d) => std::io::SeekFrom::Current(d),
            SeekFrom::End(d) => std::io::SeekFrom::End(d),
        };
        f.seek(std_pos)
            .map_err(|e| StreamError::with_source(ErrorKind::Io, "file seek failed", e))
    }

    fn tell(&mut self) -> Result<u64> {
        let f = self.file_mut()?;
        f.stream_position()
            .map_err(|e| StreamError::with_source(ErrorKind::Io, "file tell failed", e))
    }

    fn flush(&mut self) -> Result<()> {
        let f = self.file_mut()?;
        f.flush()
            .map_err(|e| StreamError::with_source(ErrorKind::Io, "file flush failed", e))
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle closes it; for borrowed origins this is the
        // OS-level duplicate, so the caller's handle stays open.
        self.file = None;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        let f = self.file_mut()?;
        let meta = f
            .metadata()
            .map_err(|e| StreamError::with_source(ErrorKind::Io, "file stat failed", e))?;
        Ok(meta.len())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        let f = self.file_mut()?;
        f.set_len(len)
            .map_err(|e| StreamError::with_source(ErrorKind::Io, "file truncate failed", e))
    }

    fn describe(&self) -> &'static str {
        match self.origin {
            HandleOrigin::Owned => "owned_file",
            HandleOrigin::Borrowed => "file",
            HandleOrigin::OwnedNative => "owned_native_file",
            HandleOrigin::BorrowedNative => "native_file",
        }
    }

    fn capabilities(&self) -> Caps {
        Caps {
            readable: self.flags.readable,
            writable: self.flags.writable,
            seekable: true,
            reject_nul_pushback: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::mode::parse_mode;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("stackio_file_test_{}_{}", std::process::id(), name));
        p
    }

    #[test]
    fn test_open_write_read_roundtrip() {
        let path = temp_path("rw");
        let mut d = FileDevice::open(&path, parse_mode("wb")).unwrap();
        d.write(b"hello").unwrap();
        d.flush().unwrap();
        d.close().unwrap();

        let mut d = FileDevice::open(&path, parse_mode("rb")).unwrap();
        let mut buf = [0u8; 16];
        let n = d.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(d.size().unwrap(), 5);
        d.close().unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_exclusive_open_fails_on_existing() {
        let path = temp_path("excl");
        std::fs::write(&path, b"x").unwrap();
        let err = FileDevice::open(&path, parse_mode("wxb")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyOpen);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_borrowed_leaves_caller_handle_open() {
        let path = temp_path("borrow");
        std::fs::write(&path, b"data").unwrap();
        let mut caller = File::open(&path).unwrap();
        let mut d =
            FileDevice::duplicate(&caller, parse_mode("rb"), HandleOrigin::Borrowed).unwrap();
        d.close().unwrap();
        // Caller's handle still works after the stream closed its dup.
        let mut buf = Vec::new();
        caller.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"data");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_mode_without_capabilities_rejected() {
        let path = temp_path("nocaps");
        let err = FileDevice::open(&path, parse_mode("b")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_describe_tags() {
        let path = temp_path("tags");
        let d = FileDevice::open(&path, parse_mode("wb")).unwrap();
        assert_eq!(d.describe(), "owned_file");
        std::fs::remove_file(&path).ok();
    }
}
