//! Stream error taxonomy.
//!
//! Every failing stream operation reports one of a closed set of error
//! kinds. The kind is also recorded in the stream as the sticky error
//! indicator, so callers can distinguish "short read because eof" from
//! "short read because error" after the fact.

use thiserror::Error;

/// Closed set of user-visible error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Read attempted on a stream positioned for writing (or not readable).
    ReadForbidden,
    /// Write attempted on a stream positioned for reading (or not writable).
    WriteForbidden,
    /// Non-blocking handle had no data/space; retry later.
    WouldBlock,
    /// OS-level timeout expired on the backing handle.
    TimedOut,
    /// Allocation failure.
    NoMemory,
    /// Fixed-size sink is full, or a push-back buffer overflowed.
    NoBufferSpace,
    /// Malformed input to a codec (bad hex digit, bad padding, corrupt
    /// compressed data).
    BadMessage,
    /// Argument outside its documented domain.
    InvalidArgument,
    /// The device cannot seek, or cannot represent the requested position.
    SeekNotSupported,
    /// Generic I/O failure from the backing handle.
    Io,
    /// The device does not implement the requested operation.
    NotSupported,
    /// Open attempted on an already-open resource.
    AlreadyOpen,
    /// Operation past the logical end of the stream.
    EndOfStream,
}

impl ErrorKind {
    /// Stable lowercase token for reports and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ReadForbidden => "read_forbidden",
            ErrorKind::WriteForbidden => "write_forbidden",
            ErrorKind::WouldBlock => "would_block",
            ErrorKind::TimedOut => "timed_out",
            ErrorKind::NoMemory => "no_memory",
            ErrorKind::NoBufferSpace => "no_buffer_space",
            ErrorKind::BadMessage => "bad_message",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::SeekNotSupported => "seek_not_supported",
            ErrorKind::Io => "io",
            ErrorKind::NotSupported => "not_supported",
            ErrorKind::AlreadyOpen => "already_open",
            ErrorKind::EndOfStream => "end_of_stream",
        }
    }
}

/// Error type carried by every fallible stream operation.
#[derive(Debug, Error)]
#[error("{}: {context}", .kind.as_str())]
pub struct StreamError {
    kind: ErrorKind,
    context: &'static str,
    #[source]
    source: Option<std::io::Error>,
}

impl StreamError {
    /// Build an error with a static context string.
    pub fn new(kind: ErrorKind, context: &'static str) -> Self {
        Self {
            kind,
            context,
            source: None,
        }
    }

    /// Build an error wrapping an OS-level cause.
    pub fn with_source(kind: ErrorKind, context: &'static str, source: std::io::Error) -> Self {
        Self {
            kind,
            context,
            source: Some(source),
        }
    }

    /// The taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The static context string.
    pub fn context(&self) -> &'static str {
        self.context
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::WouldBlock => ErrorKind::WouldBlock,
            std::io::ErrorKind::TimedOut => ErrorKind::TimedOut,
            std::io::ErrorKind::OutOfMemory => ErrorKind::NoMemory,
            std::io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyOpen,
            std::io::ErrorKind::UnexpectedEof => ErrorKind::EndOfStream,
            _ => ErrorKind::Io,
        };
        StreamError::with_source(kind, "os error", e)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tokens_are_stable() {
        assert_eq!(ErrorKind::BadMessage.as_str(), "bad_message");
        assert_eq!(ErrorKind::NoBufferSpace.as_str(), "no_buffer_space");
    }

    #[test]
    fn test_io_error_mapping() {
        let e = std::io::Error::new(std::io::ErrorKind::WouldBlock, "again");
        let s = StreamError::from(e);
        assert_eq!(s.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn test_display_includes_kind_and_context() {
        let e = StreamError::new(ErrorKind::ReadForbidden, "stream is writing");
        let msg = e.to_string();
        assert!(msg.contains("read_forbidden"));
        assert!(msg.contains("stream is writing"));
    }
}
