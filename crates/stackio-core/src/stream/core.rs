//! The stream object.
//!
//! `Stream` is a cheap-to-clone handle over shared stream state; the
//! state owns a boxed [`Device`] plus everything the device does not
//! have to care about: capability narrowing from the open mode, the
//! directional state machine, sticky error/eof indicators, the logical
//! position, the push-back LIFO, text-mode translation, and the optional
//! internal buffer.
//!
//! Handles are single-threaded by design; the only process-wide shared
//! state in this crate is the registry layer. Dropping a handle never
//! closes the stream — `close` is explicit, and closing a filter never
//! closes the inner stream the filter borrows.

use std::cell::RefCell;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::buffer::{BufMode, IoBuffer};
use crate::stream::device::{Caps, Device, SeekFrom, ShutdownHow};
use crate::stream::file::{FileDevice, HandleOrigin};
use crate::stream::mem::{CStrDevice, EmptyDevice, GrowableBufDevice, Growth, SizedBufDevice};
use crate::stream::mode::{OpenFlags, parse_mode};
use crate::stream::state::{Direction, StateFlags, UngetBuf};
use crate::stream::text::{self, TextState};

/// Shared stream handle.
#[derive(Clone)]
pub struct Stream {
    core: Rc<RefCell<StreamCore>>,
}

/// Opaque position token from `getpos`, consumed by `setpos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPos(u64);

struct StreamCore {
    device: Box<dyn Device>,
    flags: OpenFlags,
    caps: Caps,
    dir: Direction,
    state: StateFlags,
    /// Logical position in outer-stream bytes.
    pos: u64,
    unget: UngetBuf,
    text: TextState,
    buffer: Option<IoBuffer>,
    closed: bool,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("Stream")
            .field("type", &core.device.describe())
            .field("dir", &core.dir)
            .field("pos", &core.pos)
            .field("error", &core.state.error)
            .field("eof", &core.state.eof)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Stream {
    /// Wrap an arbitrary device with explicit open flags.
    pub fn with_device_flags(device: Box<dyn Device>, flags: OpenFlags) -> Stream {
        let device_caps = device.capabilities();
        let caps = Caps {
            readable: flags.readable && device_caps.readable,
            writable: flags.writable && device_caps.writable,
            seekable: device_caps.seekable,
            reject_nul_pushback: device_caps.reject_nul_pushback,
        };
        Stream {
            core: Rc::new(RefCell::new(StreamCore {
                device,
                flags,
                caps,
                dir: Direction::Fresh,
                state: StateFlags::default(),
                pos: 0,
                unget: UngetBuf::default(),
                text: TextState::default(),
                buffer: None,
                closed: false,
            })),
        }
    }

    /// Wrap a custom device; the mode string narrows its capabilities.
    pub fn custom(device: impl Device + 'static, mode: &str) -> Result<Stream> {
        let flags = parse_mode(mode);
        if !flags.readable && !flags.writable {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "mode grants no capabilities",
            ));
        }
        Ok(Stream::with_device_flags(Box::new(device), flags))
    }

    /// Zero-length read-only stream.
    pub fn empty() -> Stream {
        Stream::with_device_flags(Box::new(EmptyDevice), parse_mode("rb"))
    }

    /// Read-only stream over a NUL-terminated byte string.
    pub fn cstring(data: impl Into<Vec<u8>>) -> Stream {
        Stream::with_device_flags(Box::new(CStrDevice::new(data)), parse_mode("rb"))
    }

    /// Fixed-size buffer stream over a caller-sized array.
    pub fn sized_buffer(data: Vec<u8>, mode: &str) -> Result<Stream> {
        Stream::custom(SizedBufDevice::new(data), mode)
    }

    /// Growable buffer that grows exactly to the bytes required.
    pub fn minimal_buffer(mode: &str) -> Result<Stream> {
        let flags = parse_mode(mode);
        Stream::custom(GrowableBufDevice::new(Growth::Minimal, flags.append), mode)
    }

    /// Growable buffer with amortized 1.5x growth.
    pub fn dynamic_buffer(mode: &str) -> Result<Stream> {
        let flags = parse_mode(mode);
        Stream::custom(GrowableBufDevice::new(Growth::Amortized, flags.append), mode)
    }

    /// Growable buffer seeded with initial contents.
    pub fn dynamic_buffer_with(data: Vec<u8>, mode: &str) -> Result<Stream> {
        let flags = parse_mode(mode);
        Stream::custom(
            GrowableBufDevice::with_contents(Growth::Amortized, flags.append, data),
            mode,
        )
    }

    /// Open a file at `path` per the mode string.
    pub fn open_path(path: impl AsRef<Path>, mode: &str) -> Result<Stream> {
        let flags = parse_mode(mode);
        let device = FileDevice::open(path.as_ref(), flags)?;
        Ok(Stream::with_device_flags(Box::new(device), flags))
    }

    /// Adopt an open `File`; the stream closes it.
    pub fn from_file(file: File, mode: &str) -> Result<Stream> {
        let flags = parse_mode(mode);
        let origin = if flags.grab_handle {
            HandleOrigin::OwnedNative
        } else {
            HandleOrigin::Owned
        };
        if !flags.readable && !flags.writable {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "mode grants no capabilities",
            ));
        }
        Ok(Stream::with_device_flags(
            Box::new(FileDevice::adopt(file, flags, origin)),
            flags,
        ))
    }

    /// Duplicate a caller's `File`; the caller's handle is never closed.
    pub fn borrow_file(file: &File, mode: &str) -> Result<Stream> {
        let flags = parse_mode(mode);
        if !flags.readable && !flags.writable {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "mode grants no capabilities",
            ));
        }
        let device = FileDevice::duplicate(file, flags, HandleOrigin::Borrowed)?;
        Ok(Stream::with_device_flags(Box::new(device), flags))
    }

    /// Adopt a native descriptor on unix; the stream closes it.
    #[cfg(unix)]
    pub fn from_fd(fd: std::os::fd::OwnedFd, mode: &str) -> Result<Stream> {
        let flags = parse_mode(mode);
        if !flags.readable && !flags.writable {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "mode grants no capabilities",
            ));
        }
        let origin = if flags.grab_handle {
            HandleOrigin::OwnedNative
        } else {
            HandleOrigin::BorrowedNative
        };
        Ok(Stream::with_device_flags(
            Box::new(FileDevice::adopt(File::from(fd), flags, origin)),
            flags,
        ))
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Stream {
    /// Read into `buf`. Returns the bytes transferred; a short count with
    /// the eof indicator set means end of stream, with the error
    /// indicator set means a mid-transfer failure.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.core.borrow_mut().read(buf)
    }

    /// Write `buf`. Returns the bytes accepted.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.core.borrow_mut().write(buf)
    }

    /// Write all of `buf` or fail.
    pub fn write_all(&self, buf: &[u8]) -> Result<()> {
        let mut off = 0;
        while off < buf.len() {
            let n = self.write(&buf[off..])?;
            if n == 0 {
                return Err(StreamError::new(
                    ErrorKind::NoBufferSpace,
                    "sink accepted no bytes",
                ));
            }
            off += n;
        }
        Ok(())
    }

    /// Read one byte; `None` at end of stream.
    pub fn getc(&self) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        match self.read(&mut b)? {
            0 => Ok(None),
            _ => Ok(Some(b[0])),
        }
    }

    /// Push a byte back for re-reading. At least four pushed-back bytes
    /// are honored; a full push-back buffer reports NoBufferSpace without
    /// marking the stream errored.
    pub fn ungetc(&self, byte: u8) -> Result<()> {
        self.core.borrow_mut().ungetc(byte)
    }

    /// Write one byte.
    pub fn putc(&self, byte: u8) -> Result<()> {
        self.write_all(&[byte])
    }

    /// Write a string (no trailing newline is added).
    pub fn puts(&self, s: &str) -> Result<()> {
        self.write_all(s.as_bytes())
    }

    /// Read a line up to and including LF. `None` at end of stream.
    pub fn gets(&self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        loop {
            match self.getc()? {
                Some(b) => {
                    line.push(b);
                    if b == b'\n' {
                        return Ok(Some(line));
                    }
                }
                None => {
                    if line.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(line));
                }
            }
        }
    }

    /// Reposition the stream. A zero-offset current-origin seek is the
    /// position-commit that legalizes a direction switch.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        self.core.borrow_mut().seek(pos)
    }

    /// Logical position in outer-stream bytes.
    pub fn tell(&self) -> u64 {
        self.core.borrow().pos
    }

    /// Capture the current position as an opaque token for `setpos`.
    pub fn getpos(&self) -> StreamPos {
        StreamPos(self.tell())
    }

    /// Restore a position captured with `getpos`.
    pub fn setpos(&self, pos: StreamPos) -> Result<()> {
        self.seek(SeekFrom::Start(pos.0)).map(|_| ())
    }

    /// Flush pending writes (or commit a read position) and reset the
    /// directional state.
    pub fn flush(&self) -> Result<()> {
        self.core.borrow_mut().flush()
    }

    /// Close the stream: flush, finalize the device, release resources.
    /// Idempotent. Closing a filter never closes its inner stream.
    pub fn close(&self) -> Result<()> {
        self.core.borrow_mut().close()
    }

    /// Sticky error kind, if any.
    pub fn error(&self) -> Option<ErrorKind> {
        self.core.borrow().state.error
    }

    /// Sticky end-of-stream indicator.
    pub fn eof(&self) -> bool {
        self.core.borrow().state.eof
    }

    /// Clear the sticky error and eof indicators.
    pub fn clear_err(&self) {
        let mut core = self.core.borrow_mut();
        core.state.error = None;
        core.state.eof = false;
        core.device.clear_err();
    }

    /// Total size, where the device can report one.
    pub fn size(&self) -> Result<u64> {
        self.core.borrow_mut().device.size()
    }

    /// Truncate or extend to `len` bytes.
    pub fn truncate(&self, len: u64) -> Result<u64> {
        let mut core = self.core.borrow_mut();
        core.device.truncate(len)?;
        Ok(len)
    }

    /// Attach or retune the internal buffer. Fails once I/O has started.
    pub fn set_buffering(&self, mode: BufMode, size: usize) -> Result<()> {
        self.core.borrow_mut().set_buffering(mode, size)
    }

    /// Set the read timeout on a socket-backed device.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.core.borrow_mut().device.set_read_timeout(timeout)
    }

    /// Set the write timeout on a socket-backed device.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.core.borrow_mut().device.set_write_timeout(timeout)
    }

    /// Shut down one or both halves of a bidirectional device.
    pub fn shutdown(&self, how: ShutdownHow) -> Result<()> {
        self.core.borrow_mut().device.shutdown(how)
    }

    /// Machine-readable stream type tag.
    pub fn describe(&self) -> &'static str {
        self.core.borrow().device.describe()
    }

    /// Snapshot of a memory-backed device's accumulated bytes.
    pub fn contents(&self) -> Result<Vec<u8>> {
        let core = self.core.borrow();
        core.device
            .contents()
            .map(|s| s.to_vec())
            .ok_or_else(|| StreamError::new(ErrorKind::NotSupported, "device has no contents"))
    }

    /// The open flags the stream was constructed with.
    pub fn open_flags(&self) -> OpenFlags {
        self.core.borrow().flags
    }

    /// True once `close` has run.
    pub fn is_closed(&self) -> bool {
        self.core.borrow().closed
    }
}

// ---------------------------------------------------------------------------
// Core logic
// ---------------------------------------------------------------------------

impl StreamCore {
    fn fail(&mut self, kind: ErrorKind, context: &'static str) -> StreamError {
        self.state.error = Some(kind);
        StreamError::new(kind, context)
    }

    fn replay_error(&self) -> Result<()> {
        if self.closed {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "stream is closed",
            ));
        }
        match self.state.error {
            Some(kind) => Err(StreamError::new(kind, "sticky error")),
            None => Ok(()),
        }
    }

    fn enter_reading(&mut self) -> Result<()> {
        if !self.caps.readable {
            return Err(self.fail(ErrorKind::ReadForbidden, "stream is not readable"));
        }
        match self.dir {
            Direction::Writing => {
                Err(self.fail(ErrorKind::ReadForbidden, "stream is positioned for writing"))
            }
            Direction::Fresh => {
                self.device.switch_direction(Direction::Reading)?;
                self.dir = Direction::Reading;
                Ok(())
            }
            Direction::Reading => Ok(()),
        }
    }

    fn enter_writing(&mut self) -> Result<()> {
        if !self.caps.writable {
            return Err(self.fail(ErrorKind::WriteForbidden, "stream is not writable"));
        }
        match self.dir {
            Direction::Reading => {
                Err(self.fail(ErrorKind::WriteForbidden, "stream is positioned for reading"))
            }
            Direction::Fresh => {
                self.device.switch_direction(Direction::Writing)?;
                self.dir = Direction::Writing;
                Ok(())
            }
            Direction::Writing => Ok(()),
        }
    }

    // -- raw device access through the optional internal buffer ------------

    fn device_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if let Some(b) = self.buffer.as_mut() {
            if b.readable() == 0 {
                let space = b.fill_space();
                let n = self.device.read(space)?;
                b.commit_fill(n);
            }
            let got = b.read(buf.len());
            let len = got.len();
            buf[..len].copy_from_slice(got);
            Ok(len)
        } else {
            self.device.read(buf)
        }
    }

    fn device_write_all(&mut self, data: &[u8]) -> Result<()> {
        if let Some(b) = self.buffer.as_mut() {
            let result = b.write(data);
            if result.flush_needed {
                let pending = result.flush_data;
                self.raw_write_all(&pending)?;
            }
            Ok(())
        } else {
            self.raw_write_all(data)
        }
    }

    fn raw_write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut off = 0;
        while off < data.len() {
            let n = self.device.write(&data[off..])?;
            if n == 0 {
                return Err(StreamError::new(
                    ErrorKind::NoBufferSpace,
                    "device accepted no bytes",
                ));
            }
            off += n;
        }
        Ok(())
    }

    // -- logical byte fetch (push-back, then text translation) -------------

    fn fetch_raw(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.text.take_pending() {
            return Ok(Some(b));
        }
        let mut one = [0u8; 1];
        match self.device_read(&mut one)? {
            0 => Ok(None),
            _ => Ok(Some(one[0])),
        }
    }

    fn next_logical_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.unget.pop() {
            return Ok(Some(b));
        }
        if self.flags.binary {
            return self.fetch_raw();
        }
        match self.fetch_raw()? {
            None => Ok(None),
            Some(b'\r') => {
                // CR, LF, and CR LF all fold to LF; a CR at eof folds
                // silently to end-of-line.
                let lookahead = self.fetch_raw()?;
                if let Some(keep) = text::fold_crlf(lookahead) {
                    self.text.set_pending(keep);
                }
                Ok(Some(b'\n'))
            }
            Some(b) => Ok(Some(b)),
        }
    }

    // -- public operation bodies --------------------------------------------

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.replay_error()?;
        if buf.is_empty() {
            return Ok(0);
        }
        self.enter_reading()?;

        let mut n = 0;

        // Push-back drains first, LIFO.
        while n < buf.len() {
            match self.unget.pop() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }

        if self.flags.binary {
            // Bulk path for binary streams.
            while n < buf.len() {
                match self.device_read(&mut buf[n..]) {
                    Ok(0) => {
                        self.state.eof = true;
                        break;
                    }
                    Ok(got) => n += got,
                    Err(e) => {
                        self.state.error = Some(e.kind());
                        if n > 0 {
                            break;
                        }
                        return Err(e);
                    }
                }
            }
        } else {
            while n < buf.len() {
                match self.next_logical_byte() {
                    Ok(Some(b)) => {
                        buf[n] = b;
                        n += 1;
                    }
                    Ok(None) => {
                        self.state.eof = true;
                        break;
                    }
                    Err(e) => {
                        self.state.error = Some(e.kind());
                        if n > 0 {
                            break;
                        }
                        return Err(e);
                    }
                }
            }
        }

        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.replay_error()?;
        if data.is_empty() {
            return Ok(0);
        }
        self.enter_writing()?;

        if self.buffer.is_none() && (self.flags.binary || text::LINE_SEP == b"\n") {
            // Direct path: report the partial count on a mid-transfer
            // failure, with the sticky error distinguishing it from a
            // clean short write.
            let mut off = 0;
            while off < data.len() {
                match self.device.write(&data[off..]) {
                    Ok(0) => {
                        let e = self.fail(ErrorKind::NoBufferSpace, "device accepted no bytes");
                        if off > 0 {
                            break;
                        }
                        return Err(e);
                    }
                    Ok(n) => off += n,
                    Err(e) => {
                        self.state.error = Some(e.kind());
                        if off > 0 {
                            break;
                        }
                        return Err(e);
                    }
                }
            }
            self.pos += off as u64;
            return Ok(off);
        }

        let result = if self.flags.binary || text::LINE_SEP == b"\n" {
            self.device_write_all(data)
        } else {
            self.write_text_translated(data)
        };

        match result {
            Ok(()) => {
                self.pos += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                self.state.error = Some(e.kind());
                Err(e)
            }
        }
    }

    fn write_text_translated(&mut self, data: &[u8]) -> Result<()> {
        let mut start = 0;
        for (i, &b) in data.iter().enumerate() {
            if b == b'\n' {
                if i > start {
                    self.device_write_all(&data[start..i])?;
                }
                self.device_write_all(text::LINE_SEP)?;
                start = i + 1;
            }
        }
        if start < data.len() {
            self.device_write_all(&data[start..])?;
        }
        Ok(())
    }

    fn ungetc(&mut self, byte: u8) -> Result<()> {
        self.replay_error()?;
        if !self.caps.readable {
            return Err(self.fail(ErrorKind::ReadForbidden, "stream is not readable"));
        }
        if self.caps.reject_nul_pushback && byte == 0 {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "cannot push a NUL into a cstring stream",
            ));
        }
        if self.dir == Direction::Writing {
            return Err(self.fail(ErrorKind::ReadForbidden, "stream is positioned for writing"));
        }
        if !self.unget.push(byte) {
            // Full push-back is reported, not a stream error.
            return Err(StreamError::new(
                ErrorKind::NoBufferSpace,
                "push-back buffer is full",
            ));
        }
        self.dir = Direction::Reading;
        self.state.eof = false;
        self.pos = self.pos.saturating_sub(1);
        Ok(())
    }

    /// Commit the current direction: flush pending writes, or rewind the
    /// device past any read-ahead the consumer never saw.
    fn commit(&mut self) -> Result<()> {
        match self.dir {
            Direction::Writing => {
                if let Some(b) = self.buffer.as_mut() {
                    let pending = b.pending_write_data().to_vec();
                    b.mark_flushed();
                    if !pending.is_empty() {
                        self.raw_write_all(&pending)?;
                    }
                }
                self.device.flush()?;
            }
            Direction::Reading => {
                let mut leftover = self.unget.len() as i64;
                if let Some(b) = self.buffer.as_mut() {
                    leftover += b.readable() as i64;
                    b.reset();
                }
                if self.text.take_pending().is_some() {
                    leftover += 1;
                }
                self.unget.clear();
                if leftover > 0 && self.caps.seekable {
                    self.device.seek(SeekFrom::Current(-leftover))?;
                }
            }
            Direction::Fresh => {}
        }
        self.text.reset();
        self.dir = Direction::Fresh;
        self.device.switch_direction(Direction::Fresh)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.replay_error()?;
        match self.commit() {
            Ok(()) => Ok(()),
            Err(e) => {
                // A failed direction-switch flush sets the error but must
                // not corrupt the position.
                self.state.error = Some(e.kind());
                Err(e)
            }
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.replay_error()?;
        self.commit().map_err(|e| {
            self.state.error = Some(e.kind());
            e
        })?;

        if pos == SeekFrom::Current(0) {
            // Position-commit: no device motion beyond the commit itself.
            if self.caps.seekable {
                if let Ok(p) = self.device.tell() {
                    self.pos = p;
                }
            }
            return Ok(self.pos);
        }

        let new_pos = match self.device.seek(pos) {
            Ok(p) => p,
            Err(e) => {
                self.state.error = Some(e.kind());
                return Err(e);
            }
        };
        // A successful seek empties the push-back buffer and clears eof.
        self.unget.clear();
        self.text.reset();
        self.state.eof = false;
        self.pos = new_pos;
        Ok(new_pos)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        // Flush pending writes even if the stream is errored; the device
        // must still release its resources.
        let flush_result = if self.dir == Direction::Writing {
            self.commit()
        } else {
            Ok(())
        };
        let close_result = self.device.close();
        self.closed = true;
        flush_result?;
        close_result
    }

    fn set_buffering(&mut self, mode: BufMode, size: usize) -> Result<()> {
        if self.dir != Direction::Fresh || self.pos != 0 {
            return Err(StreamError::new(
                ErrorKind::InvalidArgument,
                "buffering must be set before any transfer",
            ));
        }
        match self.buffer.as_mut() {
            Some(b) => {
                if !b.set_mode(mode, size) {
                    return Err(StreamError::new(
                        ErrorKind::InvalidArgument,
                        "buffering must be set before any transfer",
                    ));
                }
            }
            None => {
                self.buffer = Some(IoBuffer::new(mode, size));
            }
        }
        Ok(())
    }
}
