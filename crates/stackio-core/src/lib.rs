//! # stackio-core
//!
//! A layered stream I/O library. Every data source, sink, and
//! transformation is a uniform stream object; codecs (hex, AES, SHA-1,
//! zlib, PKCS#7, tee/concat/limit) are streams whose backing device is
//! another stream, so pipelines are built by stacking. A typed layer
//! binds variant values to type descriptors for generic serialization
//! (JSON and printf-style dispatch) through the same stream surface.
//!
//! No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod strbuf;
pub mod stream;
pub mod typed;

pub use error::{ErrorKind, Result, StreamError};
pub use strbuf::StrBuf;
pub use stream::{BufMode, Caps, Device, Direction, OpenFlags, SeekFrom, ShutdownHow, Stream, copy};
pub use typed::{Value, ValueKind};
