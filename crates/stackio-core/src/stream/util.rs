//! Stream utilities.

use crate::error::{ErrorKind, Result, StreamError};
use crate::stream::core::Stream;

/// Transfer buffer size for [`copy`].
const COPY_BUF: usize = 8192;

/// Copy from `src` to `dst` until `src` reports end of stream.
///
/// Returns the byte count transferred; the first error encountered from
/// either side propagates.
pub fn copy(src: &Stream, dst: &Stream) -> Result<u64> {
    let mut buf = [0u8; COPY_BUF];
    let mut total = 0u64;
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            if src.error().is_some() {
                return Err(StreamError::new(ErrorKind::Io, "source errored mid-copy"));
            }
            return Ok(total);
        }
        dst.write_all(&buf[..n])?;
        total += n as u64;
        if src.eof() {
            return Ok(total);
        }
    }
}
