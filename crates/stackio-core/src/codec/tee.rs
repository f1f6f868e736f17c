//! Tee filter: duplicate every write into two inner streams.
//!
//! Write-only. A failure on either branch marks the tee errored; the
//! successful branch keeps whatever it already received.

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::core::Stream;
use crate::stream::device::{Caps, Device};

/// Fan-out writer over two inner streams.
pub struct TeeFilter {
    first: Stream,
    second: Stream,
}

impl TeeFilter {
    pub fn new(first: Stream, second: Stream) -> Self {
        Self { first, second }
    }
}

impl Device for TeeFilter {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(StreamError::new(
            ErrorKind::NotSupported,
            "tee streams are write-only",
        ))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.first.flush()?;
        self.second.flush()
    }

    fn describe(&self) -> &'static str {
        "tee"
    }

    fn capabilities(&self) -> Caps {
        Caps::write_only()
    }
}

impl Stream {
    /// Tee filter duplicating writes into `first` and `second`.
    pub fn tee(first: &Stream, second: &Stream, mode: &str) -> Result<Stream> {
        Stream::custom(TeeFilter::new(first.clone(), second.clone()), mode)
    }
}
