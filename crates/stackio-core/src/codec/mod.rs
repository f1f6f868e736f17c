//! Codec filters.
//!
//! Every codec is an ordinary device whose backing "hardware" is another
//! stream. Filters borrow their inner stream: closing a filter finalizes
//! the codec (padding tails, digests, compression trailers) but never
//! closes the stream underneath.

pub mod aes;
pub mod concat;
pub mod hex;
pub mod limit;
pub mod pkcs7;
pub mod sha1;
pub mod tee;
pub mod zlib;

pub use aes::{AesFilter, AesMode, CipherOp};
pub use concat::ConcatFilter;
pub use hex::{HexDecode, HexEncode};
pub use limit::LimitFilter;
pub use pkcs7::{Pkcs7Pad, Pkcs7Unpad};
pub use sha1::{Sha1Filter, Sha1State, sha1};
pub use tee::TeeFilter;
pub use zlib::{ZlibFilter, ZlibParams};
