//! Optional internal stream buffer.
//!
//! Attached with `set_buffering` (none/line/full) on handle-backed and
//! custom devices. A single storage area serves whichever direction the
//! stream is currently in: when Reading it holds bytes pulled from the
//! device not yet consumed, when Writing it holds pending bytes to emit
//! on flush. Direction switches reset it (after the stream core flushes
//! or rewinds).

/// Default buffer capacity.
pub const DEFAULT_BUF_SIZE: usize = 8192;

/// Buffering discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufMode {
    /// Flush when the buffer fills.
    Full,
    /// Flush on newline or when the buffer fills.
    Line,
    /// No buffering; every transfer goes straight to the device.
    None,
}

/// Result of a buffered write.
#[derive(Debug)]
pub struct WriteResult {
    /// Bytes retained in the buffer.
    pub buffered: usize,
    /// Whether `flush_data` must be written to the device now.
    pub flush_needed: bool,
    /// Bytes to write to the device.
    pub flush_data: Vec<u8>,
}

/// Internal buffer state.
///
/// Invariant: `pos <= filled <= data.len()` on the read side;
/// `pos <= data.len()` on the write side (where `pos` is the fill level).
#[derive(Debug)]
pub struct IoBuffer {
    data: Vec<u8>,
    pos: usize,
    filled: usize,
    mode: BufMode,
    io_started: bool,
}

impl IoBuffer {
    /// Create a buffer with the given mode and capacity.
    pub fn new(mode: BufMode, capacity: usize) -> Self {
        let cap = if matches!(mode, BufMode::None) {
            0
        } else {
            capacity.max(1)
        };
        Self {
            data: vec![0u8; cap],
            pos: 0,
            filled: 0,
            mode,
            io_started: false,
        }
    }

    /// Current mode.
    pub fn mode(&self) -> BufMode {
        self.mode
    }

    /// Storage capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Change mode and capacity. Disallowed once I/O has occurred.
    pub fn set_mode(&mut self, mode: BufMode, size: usize) -> bool {
        if self.io_started {
            return false;
        }
        *self = IoBuffer::new(mode, size);
        true
    }

    // -----------------------------------------------------------------------
    // Write side (`pos` is the fill level)
    // -----------------------------------------------------------------------

    /// Buffer a write, returning any bytes that must reach the device now.
    pub fn write(&mut self, data: &[u8]) -> WriteResult {
        self.io_started = true;
        match self.mode {
            BufMode::None => WriteResult {
                buffered: 0,
                flush_needed: true,
                flush_data: data.to_vec(),
            },
            BufMode::Full => self.write_full(data),
            BufMode::Line => self.write_line(data),
        }
    }

    /// Pending write bytes awaiting a flush.
    pub fn pending_write_data(&self) -> &[u8] {
        &self.data[..self.pos]
    }

    /// Mark the pending write bytes as flushed.
    pub fn mark_flushed(&mut self) {
        self.pos = 0;
    }

    // -----------------------------------------------------------------------
    // Read side (`pos` is the consume cursor, `filled` the valid count)
    // -----------------------------------------------------------------------

    /// Consume up to `count` buffered bytes.
    pub fn read(&mut self, count: usize) -> &[u8] {
        self.io_started = true;
        let take = count.min(self.filled - self.pos);
        let slice = &self.data[self.pos..self.pos + take];
        self.pos += take;
        slice
    }

    /// Unconsumed buffered byte count.
    pub fn readable(&self) -> usize {
        self.filled.saturating_sub(self.pos)
    }

    /// Expose the whole storage as a refill target. Any unconsumed bytes
    /// are discarded; call only when `readable() == 0`.
    pub fn fill_space(&mut self) -> &mut [u8] {
        self.io_started = true;
        self.pos = 0;
        self.filled = 0;
        &mut self.data
    }

    /// Record that `n` bytes of the refill target are now valid.
    pub fn commit_fill(&mut self, n: usize) {
        debug_assert!(n <= self.data.len());
        self.pos = 0;
        self.filled = n;
    }

    /// Discard all buffered state (both directions).
    pub fn reset(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn write_full(&mut self, data: &[u8]) -> WriteResult {
        let remaining = self.data.len().saturating_sub(self.pos);
        if data.len() <= remaining {
            self.data[self.pos..self.pos + data.len()].copy_from_slice(data);
            self.pos += data.len();
            WriteResult {
                buffered: data.len(),
                flush_needed: false,
                flush_data: Vec::new(),
            }
        } else {
            let mut flush = Vec::with_capacity(self.pos + data.len());
            flush.extend_from_slice(&self.data[..self.pos]);
            flush.extend_from_slice(data);
            self.pos = 0;
            WriteResult {
                buffered: 0,
                flush_needed: true,
                flush_data: flush,
            }
        }
    }

    fn write_line(&mut self, data: &[u8]) -> WriteResult {
        let last_nl = data.iter().rposition(|&b| b == b'\n');
        match last_nl {
            Some(nl_pos) => {
                // Flush through the last newline, buffer the remainder.
                let flush_end = nl_pos + 1;
                let mut flush = Vec::with_capacity(self.pos + flush_end);
                flush.extend_from_slice(&self.data[..self.pos]);
                flush.extend_from_slice(&data[..flush_end]);
                self.pos = 0;

                let remainder = &data[flush_end..];
                let take = remainder.len().min(self.data.len());
                self.data[..take].copy_from_slice(&remainder[..take]);
                self.pos = take;

                WriteResult {
                    buffered: take,
                    flush_needed: true,
                    flush_data: flush,
                }
            }
            None => self.write_full(data),
        }
    }
}
