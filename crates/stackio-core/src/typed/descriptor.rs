//! Type descriptors.
//!
//! A descriptor attaches manipulation operations (compare, copy, parse,
//! serialize) to a value type and, for container types, points at the
//! descriptors of its children, forming a DAG: `map<string, variant>` is
//! a map node whose key child is the string descriptor and whose value
//! child is the variant descriptor. Nodes are immutable and shared by
//! reference count; acyclicity is guaranteed by construction, since a
//! node can only reference children that already exist.
//!
//! Static descriptors are the process-wide singletons handed out by the
//! registry; dynamic descriptors are built at runtime. A static node
//! only ever references static children.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::Result;
use crate::stream::core::Stream;
use crate::typed::value::{Value, ValueKind};

/// Shared reference to an immutable descriptor node.
pub type DescRef = Arc<Descriptor>;

/// Serializer operation signature.
pub type SerializeFn = fn(&Stream, &Value, &Descriptor) -> Result<()>;
/// Parser operation signature.
pub type ParseFn = fn(&Stream, &Descriptor) -> Result<Value>;
/// Comparator operation signature.
pub type CompareFn = fn(&Value, &Value) -> Option<Ordering>;
/// Copier operation signature.
pub type CopyFn = fn(&Value) -> Value;

/// Optional per-type operation overrides. An absent operation means
/// "use the default for the kind"; a type with no meaningful default
/// (and no override) reports not-supported at the call site.
#[derive(Default, Clone, Copy)]
pub struct TypeOps {
    pub compare: Option<CompareFn>,
    pub copy: Option<CopyFn>,
    pub serialize: Option<SerializeFn>,
    pub parse: Option<ParseFn>,
}

/// Node shape.
#[derive(Clone)]
pub enum DescriptorKind {
    Leaf(ValueKind),
    List { value: DescRef },
    Map { key: DescRef, value: DescRef },
}

/// A type descriptor node.
pub struct Descriptor {
    name: String,
    size: usize,
    kind: DescriptorKind,
    dynamic: bool,
    ops: TypeOps,
}

/// Fixed in-memory size for a leaf kind; 0 for heap-managed types.
fn leaf_size(kind: ValueKind) -> usize {
    match kind {
        ValueKind::Null => 0,
        ValueKind::Bool => 1,
        ValueKind::Int | ValueKind::UInt | ValueKind::Float => 8,
        _ => 0,
    }
}

impl Descriptor {
    /// Static leaf descriptor.
    pub fn leaf(kind: ValueKind) -> DescRef {
        Arc::new(Descriptor {
            name: kind.name().to_owned(),
            size: leaf_size(kind),
            kind: DescriptorKind::Leaf(kind),
            dynamic: false,
            ops: TypeOps::default(),
        })
    }

    /// Static descriptor admitting any value shape.
    pub fn variant() -> DescRef {
        Arc::new(Descriptor {
            name: "variant".to_owned(),
            size: 0,
            kind: DescriptorKind::Leaf(ValueKind::Null),
            dynamic: false,
            ops: TypeOps::default(),
        })
    }

    /// Dynamic leaf descriptor with operation overrides.
    pub fn leaf_dynamic(name: impl Into<String>, kind: ValueKind, ops: TypeOps) -> DescRef {
        Arc::new(Descriptor {
            name: name.into(),
            size: leaf_size(kind),
            kind: DescriptorKind::Leaf(kind),
            dynamic: true,
            ops,
        })
    }

    /// Compose a list descriptor around an element type.
    pub fn build_container(value: DescRef) -> DescRef {
        let dynamic = value.dynamic;
        Arc::new(Descriptor {
            name: format!("list<{}>", value.name),
            size: 0,
            kind: DescriptorKind::List { value },
            dynamic,
            ops: TypeOps::default(),
        })
    }

    /// Compose a map descriptor around key and value types.
    pub fn build_key_value_container(key: DescRef, value: DescRef) -> DescRef {
        let dynamic = key.dynamic || value.dynamic;
        Arc::new(Descriptor {
            name: format!("map<{},{}>", key.name, value.name),
            size: 0,
            kind: DescriptorKind::Map { key, value },
            dynamic,
            ops: TypeOps::default(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn kind(&self) -> &DescriptorKind {
        &self.kind
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn ops(&self) -> &TypeOps {
        &self.ops
    }

    /// Element descriptor of a container (the value child).
    pub fn value_child(&self) -> Option<&DescRef> {
        match &self.kind {
            DescriptorKind::List { value } => Some(value),
            DescriptorKind::Map { value, .. } => Some(value),
            DescriptorKind::Leaf(_) => None,
        }
    }

    /// Key descriptor of a map.
    pub fn key_child(&self) -> Option<&DescRef> {
        match &self.kind {
            DescriptorKind::Map { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Compare two values under this type's comparator.
    pub fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match self.ops.compare {
            Some(f) => f(a, b),
            None => a.compare(b),
        }
    }

    /// Copy a value under this type's copier.
    pub fn copy_value(&self, v: &Value) -> Value {
        match self.ops.copy {
            Some(f) => f(v),
            None => v.clone(),
        }
    }

    /// True if the value's shape matches this descriptor. The `variant`
    /// leaf admits anything.
    pub fn admits(&self, v: &Value) -> bool {
        match &self.kind {
            DescriptorKind::Leaf(kind) => {
                self.name == "variant" || *kind == v.kind() || v.kind() == ValueKind::Null
            }
            DescriptorKind::List { value } => match v {
                Value::List(items) => items.iter().all(|i| value.admits(i)),
                _ => false,
            },
            DescriptorKind::Map { key, value } => match v {
                Value::Map(pairs) => pairs
                    .iter()
                    .all(|(k, val)| key.admits(k) && value.admits(val)),
                _ => false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Graph operations
// ---------------------------------------------------------------------------

/// Fresh deep copy; every node in the result is dynamic.
pub fn copy_deep(d: &DescRef) -> DescRef {
    let kind = match &d.kind {
        DescriptorKind::Leaf(k) => DescriptorKind::Leaf(*k),
        DescriptorKind::List { value } => DescriptorKind::List {
            value: copy_deep(value),
        },
        DescriptorKind::Map { key, value } => DescriptorKind::Map {
            key: copy_deep(key),
            value: copy_deep(value),
        },
    };
    Arc::new(Descriptor {
        name: d.name.clone(),
        size: d.size,
        kind,
        dynamic: true,
        ops: d.ops,
    })
}

/// Share a static descriptor, deep-copy a dynamic one.
pub fn copy_if_dynamic(d: &DescRef) -> DescRef {
    if d.dynamic { copy_deep(d) } else { d.clone() }
}

/// Deep-copy only the top `levels` of a static graph, sharing the rest.
/// Dynamic graphs are shared unchanged.
pub fn copy_if_static(d: &DescRef, levels: usize) -> DescRef {
    if d.dynamic || levels == 0 {
        return d.clone();
    }
    let kind = match &d.kind {
        DescriptorKind::Leaf(k) => DescriptorKind::Leaf(*k),
        DescriptorKind::List { value } => DescriptorKind::List {
            value: copy_if_static(value, levels - 1),
        },
        DescriptorKind::Map { key, value } => DescriptorKind::Map {
            key: copy_if_static(key, levels - 1),
            value: copy_if_static(value, levels - 1),
        },
    };
    Arc::new(Descriptor {
        name: d.name.clone(),
        size: d.size,
        kind,
        dynamic: true,
        ops: d.ops,
    })
}

/// Drop a dynamic descriptor; a no-op for statics. Shared sub-graphs are
/// reference counted, so every owner calls this exactly once.
pub fn destroy_if_dynamic(d: DescRef) {
    drop(d);
}

/// Structural equality of descriptor graphs, ignoring the dynamic flag.
pub fn types_compatible(a: &DescRef, b: &DescRef) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    if a.name != b.name || a.size != b.size {
        return false;
    }
    match (&a.kind, &b.kind) {
        (DescriptorKind::Leaf(x), DescriptorKind::Leaf(y)) => x == y,
        (DescriptorKind::List { value: va }, DescriptorKind::List { value: vb }) => {
            types_compatible(va, vb)
        }
        (
            DescriptorKind::Map { key: ka, value: va },
            DescriptorKind::Map { key: kb, value: vb },
        ) => types_compatible(ka, kb) && types_compatible(va, vb),
        _ => false,
    }
}
