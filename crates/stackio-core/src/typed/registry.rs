//! Process-wide type and format registries.
//!
//! Two registries with explicit lifecycles: the type registry maps a
//! type name to its descriptor (used at parse time to instantiate
//! values), the format registry maps a format name to a serializer and
//! parser pair. Both must be initialized with [`init`] before use and
//! torn down with [`teardown`]; nothing is created lazily.
//!
//! Lookup is far more frequent than registration, so a read-mostly lock
//! over a plain map is enough. These are the only pieces of shared
//! state in the crate and are safe for concurrent use.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ErrorKind, Result, StreamError};
use crate::typed::descriptor::{DescRef, Descriptor};
use crate::typed::json::{JsonAsciiFormat, JsonFormat, JsonParser};
use crate::typed::serialize::{Utf8Format, ValueParser, ValueSerializer};
use crate::typed::value::ValueKind;

/// Serializer/parser pair registered under a format name.
#[derive(Clone)]
pub struct FormatEntry {
    pub serializer: Arc<dyn ValueSerializer + Send + Sync>,
    pub parser: Option<Arc<dyn ValueParser + Send + Sync>>,
}

static TYPES: RwLock<Option<HashMap<String, DescRef>>> = RwLock::new(None);
static FORMATS: RwLock<Option<HashMap<String, FormatEntry>>> = RwLock::new(None);

/// Initialize both registries and install the builtins. Idempotent.
pub fn init() {
    {
        let mut types = TYPES.write();
        if types.is_none() {
            let mut map: HashMap<String, DescRef> = HashMap::new();
            for kind in [
                ValueKind::Null,
                ValueKind::Bool,
                ValueKind::Int,
                ValueKind::UInt,
                ValueKind::Float,
                ValueKind::Str,
                ValueKind::Binary,
            ] {
                let d = Descriptor::leaf(kind);
                map.insert(d.name().to_owned(), d);
            }
            let variant = Descriptor::variant();
            map.insert("variant".to_owned(), variant.clone());
            let list = Descriptor::build_container(variant.clone());
            map.insert("list".to_owned(), list);
            let map_desc = Descriptor::build_key_value_container(
                Descriptor::leaf(ValueKind::Str),
                variant,
            );
            map.insert("map".to_owned(), map_desc);
            *types = Some(map);
        }
    }
    {
        let mut formats = FORMATS.write();
        if formats.is_none() {
            let mut map: HashMap<String, FormatEntry> = HashMap::new();
            map.insert(
                "UTF8".to_owned(),
                FormatEntry {
                    serializer: Arc::new(Utf8Format),
                    parser: None,
                },
            );
            map.insert(
                "JSON".to_owned(),
                FormatEntry {
                    serializer: Arc::new(JsonFormat),
                    parser: Some(Arc::new(JsonParser)),
                },
            );
            map.insert(
                "JSON-ASCII".to_owned(),
                FormatEntry {
                    serializer: Arc::new(JsonAsciiFormat),
                    parser: Some(Arc::new(JsonParser)),
                },
            );
            *formats = Some(map);
        }
    }
}

/// Drop both registries and everything registered in them.
pub fn teardown() {
    *TYPES.write() = None;
    *FORMATS.write() = None;
}

fn not_initialized() -> StreamError {
    StreamError::new(ErrorKind::InvalidArgument, "registry is not initialized")
}

/// Register (or replace) a type descriptor under `name`. The registry
/// adopts the descriptor, dynamic or static.
pub fn register_type(name: impl Into<String>, desc: DescRef) -> Result<()> {
    let mut types = TYPES.write();
    match types.as_mut() {
        Some(map) => {
            map.insert(name.into(), desc);
            Ok(())
        }
        None => Err(not_initialized()),
    }
}

/// Descriptor registered under `name`.
pub fn lookup_type(name: &str) -> Option<DescRef> {
    TYPES.read().as_ref()?.get(name).cloned()
}

/// Register (or replace) a format under `name`.
pub fn register_format(name: impl Into<String>, entry: FormatEntry) -> Result<()> {
    let mut formats = FORMATS.write();
    match formats.as_mut() {
        Some(map) => {
            map.insert(name.into(), entry);
            Ok(())
        }
        None => Err(not_initialized()),
    }
}

/// Format entry registered under `name`.
pub fn lookup_format(name: &str) -> Option<FormatEntry> {
    FORMATS.read().as_ref()?.get(name).cloned()
}

/// Parse a value of a registered type from `input` using a registered
/// format's parser. This is the parse-time entry point the type
/// registry exists for.
pub fn parse_typed(
    input: &crate::stream::core::Stream,
    type_name: &str,
    format_name: &str,
) -> Result<crate::typed::value::Value> {
    let desc = lookup_type(type_name)
        .ok_or_else(|| StreamError::new(ErrorKind::InvalidArgument, "unregistered type name"))?;
    let entry = lookup_format(format_name)
        .ok_or_else(|| StreamError::new(ErrorKind::InvalidArgument, "unregistered format name"))?;
    let parser = entry
        .parser
        .ok_or_else(|| StreamError::new(ErrorKind::NotSupported, "format has no parser"))?;
    parser.parse(input, &desc)
}
