//! Stream layer: the polymorphic stream object, its device seam, and
//! the built-in device variants.

pub mod buffer;
pub mod core;
pub mod device;
pub mod file;
pub mod mem;
pub mod mode;
pub mod state;
pub mod text;
pub mod util;

pub use self::core::{Stream, StreamPos};
pub use buffer::BufMode;
pub use device::{Caps, Device, SeekFrom, ShutdownHow};
pub use mode::{OpenFlags, parse_mode};
pub use state::Direction;
pub use util::copy;
