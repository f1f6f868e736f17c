//! Typed layer: variant values, type descriptors, registries, and the
//! generic serializers that bind them to the stream layer.

pub mod descriptor;
pub mod fmt;
pub mod json;
pub mod registry;
pub mod serialize;
pub mod value;

pub use descriptor::{
    DescRef, Descriptor, DescriptorKind, TypeOps, copy_deep, copy_if_dynamic, copy_if_static,
    destroy_if_dynamic, types_compatible,
};
pub use fmt::{Arg, Scanned, read_format, write_format};
pub use json::{JsonAsciiFormat, JsonFormat, JsonParser};
pub use registry::FormatEntry;
pub use serialize::{FormatIdentity, Utf8Format, ValueParser, ValueSerializer};
pub use value::{Value, ValueKind};
