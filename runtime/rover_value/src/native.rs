//! Bridge between runtime values and native recursive structures.
//!
//! Constructs exchange data with the host through `NativeNode`: a plain
//! recursive structure whose container nodes are shared and lockable, so
//! self-referential data can be expressed. Both directions are cycle-safe
//! by identity: `extract_value` returns the same native node on repeat
//! visits of one cell, and `parse_object` creates LIST/OBJECT stubs
//! before recursing into children.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::errors::RuntimeError;
use crate::{AtomicValue, RuntimeValue, ValueKind};

/// Shared native list node.
#[derive(Clone, Default)]
pub struct NativeList(Arc<RwLock<Vec<NativeNode>>>);

impl NativeList {
    /// Create an empty list node.
    pub fn new() -> Self {
        NativeList(Arc::new(RwLock::new(Vec::new())))
    }

    /// Append an element.
    pub fn push(&self, node: NativeNode) {
        self.0.write().push(node);
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Element at `index`, if present.
    pub fn get(&self, index: usize) -> Option<NativeNode> {
        self.0.read().get(index).cloned()
    }

    /// Identity of the shared node.
    pub fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// Shared native object node (insertion order preserved).
#[derive(Clone, Default)]
pub struct NativeObject(Arc<RwLock<IndexMap<String, NativeNode>>>);

impl NativeObject {
    /// Create an empty object node.
    pub fn new() -> Self {
        NativeObject(Arc::new(RwLock::new(IndexMap::new())))
    }

    /// Insert or replace an entry.
    pub fn insert(&self, key: impl Into<String>, node: NativeNode) {
        self.0.write().insert(key.into(), node);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Whether the object is empty.
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Entry at insertion position `index`, if present.
    pub fn entry_at(&self, index: usize) -> Option<(String, NativeNode)> {
        self.0
            .read()
            .get_index(index)
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<NativeNode> {
        self.0.read().get(key).cloned()
    }

    /// Identity of the shared node.
    pub fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// Native recursive structure.
#[derive(Clone)]
pub enum NativeNode {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(NativeList),
    Object(NativeObject),
}

impl std::fmt::Debug for NativeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeNode::Null => write!(f, "Null"),
            NativeNode::Bool(b) => write!(f, "Bool({b})"),
            NativeNode::Number(n) => write!(f, "Number({n})"),
            NativeNode::Text(s) => write!(f, "Text({s:?})"),
            NativeNode::List(l) => write!(f, "List({} items)", l.len()),
            NativeNode::Object(o) => write!(f, "Object({} entries)", o.len()),
        }
    }
}

impl RuntimeValue {
    /// Deep conversion to a native recursive structure.
    ///
    /// Repeat visits of one cell (sharing or cycles) return the same
    /// native node by identity.
    pub fn extract_value(&self) -> Result<NativeNode, RuntimeError> {
        let mut seen: FxHashMap<usize, NativeNode> = FxHashMap::default();
        self.extract_inner(&mut seen)
    }

    fn extract_inner(
        &self,
        seen: &mut FxHashMap<usize, NativeNode>,
    ) -> Result<NativeNode, RuntimeError> {
        match self.kind()? {
            ValueKind::Atomic => Ok(match self.atomic()? {
                AtomicValue::Null => NativeNode::Null,
                AtomicValue::Bool(b) => NativeNode::Bool(b),
                AtomicValue::Number(n) => NativeNode::Number(n),
                AtomicValue::Text(s) => NativeNode::Text(s),
                bin @ AtomicValue::Binary(_) => NativeNode::Text(bin.string_value()),
            }),
            ValueKind::List => {
                if let Some(existing) = seen.get(&self.ptr_id()) {
                    return Ok(existing.clone());
                }
                let list = NativeList::new();
                seen.insert(self.ptr_id(), NativeNode::List(list.clone()));
                let len = self.list_len()?;
                for i in 0..len {
                    list.push(self.list_get(i)?.extract_inner(seen)?);
                }
                Ok(NativeNode::List(list))
            }
            ValueKind::Object => {
                if let Some(existing) = seen.get(&self.ptr_id()) {
                    return Ok(existing.clone());
                }
                let object = NativeObject::new();
                seen.insert(self.ptr_id(), NativeNode::Object(object.clone()));
                let len = self.object_len()?;
                for i in 0..len {
                    if let Some((key, value)) = self.object_entry_at(i)? {
                        object.insert(key, value.extract_inner(seen)?);
                    }
                }
                Ok(NativeNode::Object(object))
            }
        }
    }

    /// Deep conversion from a native recursive structure.
    ///
    /// Container stubs are created before recursing into children, so a
    /// self-referential input terminates and shared native nodes map to
    /// one shared runtime value.
    pub fn parse_object(native: &NativeNode) -> Result<RuntimeValue, RuntimeError> {
        let mut seen: FxHashMap<usize, RuntimeValue> = FxHashMap::default();
        Self::parse_inner(native, &mut seen)
    }

    fn parse_inner(
        native: &NativeNode,
        seen: &mut FxHashMap<usize, RuntimeValue>,
    ) -> Result<RuntimeValue, RuntimeError> {
        match native {
            NativeNode::Null => Ok(RuntimeValue::null()),
            NativeNode::Bool(b) => Ok(RuntimeValue::boolean(*b)),
            NativeNode::Number(n) => Ok(RuntimeValue::number(*n)),
            NativeNode::Text(s) => Ok(RuntimeValue::text(s.clone())),
            NativeNode::List(list) => {
                if let Some(existing) = seen.get(&list.ptr_id()) {
                    return Ok(existing.clone());
                }
                let stub = RuntimeValue::list(Vec::new());
                seen.insert(list.ptr_id(), stub.clone());
                let len = list.len();
                for i in 0..len {
                    if let Some(child) = list.get(i) {
                        stub.list_push(Self::parse_inner(&child, seen)?)?;
                    }
                }
                Ok(stub)
            }
            NativeNode::Object(object) => {
                if let Some(existing) = seen.get(&object.ptr_id()) {
                    return Ok(existing.clone());
                }
                let stub = RuntimeValue::object(Vec::new());
                seen.insert(object.ptr_id(), stub.clone());
                let len = object.len();
                for i in 0..len {
                    if let Some((key, child)) = object.entry_at(i) {
                        stub.object_set(key, Self::parse_inner(&child, seen)?)?;
                    }
                }
                Ok(stub)
            }
        }
    }
}
