//! The reference-counted runtime value.
//!
//! A `RuntimeValue` is a cheap-to-clone handle onto a shared cell. The
//! cell's shape (atomic/list/object) is fixed at construction; all
//! construction goes through the factory methods (`null`, `boolean`,
//! `number`, `text`, `binary`, `list`, `object`).
//!
//! # Aliasing
//!
//! Two variables may hold the same LIST/OBJECT instance; mutation through
//! one is visible through the other. This is deliberate shared-mutable
//! state within a single robot's single thread, not a race: independent
//! robots never exchange values.
//!
//! # Reference Counting
//!
//! The count on the cell is the script-world ownership count, independent
//! of the `Arc` that keeps the Rust allocation alive. `register_reference`
//! and `release_reference` move it; release to zero closes the value
//! unless disposal is prevented. Closing a container releases exactly one
//! reference on each child. The literal singletons true/false/null are
//! immune: closing them only clears their metadata pool.


use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;

use crate::errors::{self, RuntimeError};
use crate::{AtomicValue, BinaryRef, MetaPool};

/// Value shape tag.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ValueKind {
    Atomic,
    List,
    Object,
}

impl ValueKind {
    /// Shape name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Atomic => "atomic",
            ValueKind::List => "list",
            ValueKind::Object => "object",
        }
    }
}

/// Cell payload. The variant never changes after construction.
enum Payload {
    Atomic(AtomicValue),
    List {
        items: Vec<RuntimeValue>,
        version: u64,
    },
    Object {
        entries: IndexMap<String, RuntimeValue>,
        version: u64,
    },
}

impl Payload {
    fn kind(&self) -> ValueKind {
        match self {
            Payload::Atomic(_) => ValueKind::Atomic,
            Payload::List { .. } => ValueKind::List,
            Payload::Object { .. } => ValueKind::Object,
        }
    }

    /// Current children, in order (empty for atomics).
    fn children(&self) -> Vec<RuntimeValue> {
        match self {
            Payload::Atomic(_) => Vec::new(),
            Payload::List { items, .. } => items.clone(),
            Payload::Object { entries, .. } => entries.values().cloned().collect(),
        }
    }
}

struct CellState {
    payload: Payload,
    refs: u32,
    closed: bool,
    keep: bool,
    meta: MetaPool,
}

struct ValueCell {
    state: RwLock<CellState>,
    /// Literal singleton marker; set only for true/false/null.
    singleton: bool,
}

/// The runtime value handle.
#[derive(Clone)]
pub struct RuntimeValue(Arc<ValueCell>);

static TRUE: OnceLock<RuntimeValue> = OnceLock::new();
static FALSE: OnceLock<RuntimeValue> = OnceLock::new();
static NULL: OnceLock<RuntimeValue> = OnceLock::new();

// Factory methods (the only way to construct values)

impl RuntimeValue {
    fn from_payload(payload: Payload) -> Self {
        RuntimeValue(Arc::new(ValueCell {
            state: RwLock::new(CellState {
                payload,
                refs: 0,
                closed: false,
                keep: false,
                meta: MetaPool::new(),
            }),
            singleton: false,
        }))
    }

    fn literal_singleton(payload: AtomicValue) -> Self {
        RuntimeValue(Arc::new(ValueCell {
            state: RwLock::new(CellState {
                payload: Payload::Atomic(payload),
                refs: 0,
                closed: false,
                keep: true,
                meta: MetaPool::new(),
            }),
            singleton: true,
        }))
    }

    /// The null literal singleton.
    pub fn null() -> Self {
        NULL.get_or_init(|| Self::literal_singleton(AtomicValue::Null))
            .clone()
    }

    /// One of the two boolean literal singletons.
    pub fn boolean(b: bool) -> Self {
        let cell = if b { &TRUE } else { &FALSE };
        cell.get_or_init(|| Self::literal_singleton(AtomicValue::Bool(b)))
            .clone()
    }

    /// Create a number value.
    pub fn number(n: f64) -> Self {
        Self::from_payload(Payload::Atomic(AtomicValue::Number(n)))
    }

    /// Create a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::from_payload(Payload::Atomic(AtomicValue::Text(s.into())))
    }

    /// Create a binary-stream value.
    pub fn binary(stream: BinaryRef) -> Self {
        Self::from_payload(Payload::Atomic(AtomicValue::Binary(stream)))
    }

    /// Create a LIST, registering a reference on each child.
    pub fn list(items: Vec<RuntimeValue>) -> Self {
        for item in &items {
            item.register_reference();
        }
        Self::from_payload(Payload::List { items, version: 0 })
    }

    /// Create an OBJECT (insertion order preserved), registering a
    /// reference on each child. A repeated key keeps the last value and
    /// releases the earlier one.
    pub fn object(entries: Vec<(String, RuntimeValue)>) -> Self {
        let mut map = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            value.register_reference();
            if let Some(old) = map.insert(key, value) {
                let _: Result<(), RuntimeError> = RuntimeValue::release_reference(&old);
            }
        }
        Self::from_payload(Payload::Object {
            entries: map,
            version: 0,
        })
    }
}

// Identity

impl RuntimeValue {
    /// Stable identity of the underlying cell.
    pub fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Whether two handles alias the same cell.
    pub fn same_instance(a: &RuntimeValue, b: &RuntimeValue) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

// Accessors

impl RuntimeValue {
    fn read_open(&self) -> Result<parking_lot::RwLockReadGuard<'_, CellState>, RuntimeError> {
        let guard = self.0.state.read();
        if guard.closed {
            return Err(errors::closed_value());
        }
        Ok(guard)
    }

    fn write_open(&self) -> Result<parking_lot::RwLockWriteGuard<'_, CellState>, RuntimeError> {
        let guard = self.0.state.write();
        if guard.closed {
            return Err(errors::closed_value());
        }
        Ok(guard)
    }

    /// Shape tag. Errors on a closed value.
    pub fn kind(&self) -> Result<ValueKind, RuntimeError> {
        Ok(self.read_open()?.payload.kind())
    }

    /// Atomic payload. Errors on a closed or non-atomic value.
    pub fn atomic(&self) -> Result<AtomicValue, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::Atomic(a) => Ok(a.clone()),
            other => Err(errors::type_mismatch("atomic", other.kind().name())),
        }
    }

    /// Whether this is the atomic null value.
    pub fn is_null(&self) -> Result<bool, RuntimeError> {
        let guard = self.read_open()?;
        Ok(matches!(&guard.payload, Payload::Atomic(a) if a.is_null()))
    }

    /// String representation.
    ///
    /// Containers render their children recursively; binary renders its
    /// descriptive tag.
    pub fn string_value(&self) -> Result<String, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::Atomic(a) => Ok(a.string_value()),
            Payload::List { items, .. } => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(item.string_value()?);
                }
                Ok(format!("[{}]", parts.join(", ")))
            }
            Payload::Object { entries, .. } => {
                let mut parts = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    parts.push(format!("{key}: {}", value.string_value()?));
                }
                Ok(format!("{{{}}}", parts.join(", ")))
            }
        }
    }

    /// Well-formed numeric value, if this value's kind defines one.
    pub fn numeric(&self) -> Result<Option<f64>, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::Atomic(a) => Ok(a.number_value()),
            _ => Ok(None),
        }
    }

    /// Numeric value, erroring when the value has none.
    pub fn as_number(&self) -> Result<f64, RuntimeError> {
        match self.numeric()? {
            Some(n) => Ok(n),
            None => Err(errors::not_a_number(self.string_value()?)),
        }
    }

    /// Boolean coercion: atomics use their kind's rule, containers are
    /// truthy when non-empty.
    pub fn as_boolean(&self) -> Result<bool, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::Atomic(a) => Ok(a.boolean_value()),
            Payload::List { items, .. } => Ok(!items.is_empty()),
            Payload::Object { entries, .. } => Ok(!entries.is_empty()),
        }
    }
}

// Reference counting and disposal

impl RuntimeValue {
    /// Register one script-world reference.
    pub fn register_reference(&self) {
        let mut guard = self.0.state.write();
        guard.refs = guard.refs.saturating_add(1);
    }

    /// Current reference count (diagnostic use).
    pub fn reference_count(&self) -> u32 {
        self.0.state.read().refs
    }

    /// Release one script-world reference.
    ///
    /// Release to zero closes the value unless disposal is prevented.
    /// Releasing below zero is a contract violation; the literal
    /// singletons are exempt and saturate instead.
    pub fn release_reference(&self) -> Result<(), RuntimeError> {
        let should_close = {
            let mut guard = self.0.state.write();
            if guard.refs == 0 {
                if self.0.singleton {
                    return Ok(());
                }
                return Err(errors::reference_underflow());
            }
            guard.refs -= 1;
            guard.refs == 0 && !guard.keep && !guard.closed
        };
        if should_close {
            self.close();
        }
        Ok(())
    }

    /// Mark this value (and, recursively, all current children) as exempt
    /// from disposal. Used for values escaping their lexical scope.
    pub fn prevent_disposal(&self) {
        let mut visited = FxHashSet::default();
        self.set_keep(true, &mut visited);
    }

    /// Clear the disposal exemption on this value and all current
    /// children. A value whose count already reached zero closes now.
    pub fn allow_disposal(&self) {
        let mut visited = FxHashSet::default();
        self.set_keep(false, &mut visited);
    }

    fn set_keep(&self, keep: bool, visited: &mut FxHashSet<usize>) {
        if !visited.insert(self.ptr_id()) {
            return;
        }
        if self.0.singleton {
            return;
        }
        let (children, close_now) = {
            let mut guard = self.0.state.write();
            if guard.closed {
                return;
            }
            guard.keep = keep;
            let close_now = !keep && guard.refs == 0;
            (guard.payload.children(), close_now)
        };
        for child in &children {
            child.set_keep(keep, visited);
        }
        if close_now {
            self.close();
        }
    }

    /// Close this value.
    ///
    /// Closing a container releases exactly one reference on each child.
    /// Closing a literal singleton only clears its metadata pool and
    /// resets its reference count; the singleton stays usable.
    pub fn close(&self) {
        if self.0.singleton {
            let mut guard = self.0.state.write();
            guard.meta.clear();
            guard.refs = 0;
            return;
        }
        let children = {
            let mut guard = self.0.state.write();
            if guard.closed {
                return;
            }
            guard.closed = true;
            guard.meta.clear();
            guard.payload.children()
        };
        for child in &children {
            if child.release_reference().is_err() {
                tracing::debug!("child reference underflow during close");
            }
        }
    }

    /// Whether this value has been closed.
    pub fn is_closed(&self) -> bool {
        !self.0.singleton && self.0.state.read().closed
    }
}

// Metadata pool

impl RuntimeValue {
    /// Store a typed extension, replacing any existing one of the same
    /// concrete type. Errors on a closed value.
    pub fn store_metadata<T: std::any::Any + Send + Sync>(
        &self,
        extension: T,
    ) -> Result<(), RuntimeError> {
        self.write_open()?.meta.store(extension);
        Ok(())
    }

    /// Get the extension of type `T`, if present.
    pub fn get_metadata<T: std::any::Any + Send + Sync>(
        &self,
    ) -> Result<Option<Arc<T>>, RuntimeError> {
        Ok(self.read_open()?.meta.get::<T>())
    }

    /// Whether an extension of type `T` is attached.
    pub fn has_metadata<T: std::any::Any + Send + Sync>(&self) -> Result<bool, RuntimeError> {
        Ok(self.read_open()?.meta.has::<T>())
    }

    /// Remove and return the extension of type `T`.
    pub fn remove_metadata<T: std::any::Any + Send + Sync>(
        &self,
    ) -> Result<Option<Arc<T>>, RuntimeError> {
        Ok(self.write_open()?.meta.remove::<T>())
    }
}

// Atomic mutation (parse-time result construction)

impl RuntimeValue {
    /// Replace the inner atomic payload.
    ///
    /// Only valid on ATOMIC values: the shape tag never changes after
    /// construction.
    pub fn set_atomic(&self, value: AtomicValue) -> Result<(), RuntimeError> {
        let mut guard = self.write_open()?;
        match &mut guard.payload {
            Payload::Atomic(slot) => {
                *slot = value;
                Ok(())
            }
            other => Err(errors::type_mismatch("atomic", other.kind().name())),
        }
    }
}

// LIST operations

impl RuntimeValue {
    fn expect_list<R>(
        &self,
        f: impl FnOnce(&mut Vec<RuntimeValue>, &mut u64) -> Result<R, RuntimeError>,
    ) -> Result<R, RuntimeError> {
        let mut guard = self.write_open()?;
        match &mut guard.payload {
            Payload::List { items, version } => f(items, version),
            other => Err(errors::type_mismatch("list", other.kind().name())),
        }
    }

    /// Number of elements. Errors on non-LIST.
    pub fn list_len(&self) -> Result<usize, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::List { items, .. } => Ok(items.len()),
            other => Err(errors::type_mismatch("list", other.kind().name())),
        }
    }

    /// Element at `index`.
    pub fn list_get(&self, index: usize) -> Result<RuntimeValue, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::List { items, .. } => items.get(index).cloned().ok_or_else(|| {
                errors::index_out_of_range(index as i64, items.len())
            }),
            other => Err(errors::type_mismatch("list", other.kind().name())),
        }
    }

    /// Replace the element at `index`: registers the new value, releases
    /// the old one, bumps the mutation version.
    ///
    /// The new reference is registered before the container lock is
    /// taken: the element may alias the container itself.
    pub fn list_set(&self, index: usize, value: RuntimeValue) -> Result<(), RuntimeError> {
        value.register_reference();
        let replaced = self.expect_list(|items, version| {
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or_else(|| errors::index_out_of_range(index as i64, len))?;
            let old = std::mem::replace(slot, value.clone());
            *version += 1;
            Ok(old)
        });
        match replaced {
            Ok(old) => old.release_reference(),
            Err(err) => {
                let _ = value.release_reference();
                Err(err)
            }
        }
    }

    /// Append an element: registers it and bumps the mutation version.
    pub fn list_push(&self, value: RuntimeValue) -> Result<(), RuntimeError> {
        value.register_reference();
        let pushed = self.expect_list(|items, version| {
            items.push(value.clone());
            *version += 1;
            Ok(())
        });
        if pushed.is_err() {
            let _ = value.release_reference();
        }
        pushed
    }
}

// OBJECT operations

impl RuntimeValue {
    fn expect_object<R>(
        &self,
        f: impl FnOnce(&mut IndexMap<String, RuntimeValue>, &mut u64) -> Result<R, RuntimeError>,
    ) -> Result<R, RuntimeError> {
        let mut guard = self.write_open()?;
        match &mut guard.payload {
            Payload::Object { entries, version } => f(entries, version),
            other => Err(errors::type_mismatch("object", other.kind().name())),
        }
    }

    /// Number of entries. Errors on non-OBJECT.
    pub fn object_len(&self) -> Result<usize, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::Object { entries, .. } => Ok(entries.len()),
            other => Err(errors::type_mismatch("object", other.kind().name())),
        }
    }

    /// Value for `key`, if present.
    pub fn object_get(&self, key: &str) -> Result<Option<RuntimeValue>, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::Object { entries, .. } => Ok(entries.get(key).cloned()),
            other => Err(errors::type_mismatch("object", other.kind().name())),
        }
    }

    /// Entry at insertion position `index`, if present.
    pub fn object_entry_at(
        &self,
        index: usize,
    ) -> Result<Option<(String, RuntimeValue)>, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::Object { entries, .. } => Ok(entries
                .get_index(index)
                .map(|(k, v)| (k.clone(), v.clone()))),
            other => Err(errors::type_mismatch("object", other.kind().name())),
        }
    }

    /// Insert or replace `key`: registers the new value, releases any
    /// replaced one, bumps the mutation version.
    ///
    /// As with `list_set`, the new reference is registered before the
    /// container lock is taken.
    pub fn object_set(
        &self,
        key: impl Into<String>,
        value: RuntimeValue,
    ) -> Result<(), RuntimeError> {
        value.register_reference();
        let key = key.into();
        let replaced = self.expect_object(|entries, version| {
            *version += 1;
            Ok(entries.insert(key, value.clone()))
        });
        match replaced {
            Ok(Some(old)) => old.release_reference(),
            Ok(None) => Ok(()),
            Err(err) => {
                let _ = value.release_reference();
                Err(err)
            }
        }
    }

    /// Mutation version of a LIST/OBJECT; atomics are always 0.
    ///
    /// The iterator bridge snapshots this and re-checks it on every step
    /// to detect concurrent structural modification.
    pub fn version(&self) -> Result<u64, RuntimeError> {
        let guard = self.read_open()?;
        match &guard.payload {
            Payload::Atomic(_) => Ok(0),
            Payload::List { version, .. } | Payload::Object { version, .. } => Ok(*version),
        }
    }
}

// Structural equality and hashing

impl RuntimeValue {
    /// Structural equality.
    ///
    /// Different shapes are unequal. Atomics compare null-aware, then by
    /// string representation, then numerically when both sides have a
    /// well-formed numeric value. LIST equality is order-sensitive;
    /// OBJECT equality is key-based.
    pub fn value_equals(&self, other: &RuntimeValue) -> Result<bool, RuntimeError> {
        let (a, b) = (self.kind()?, other.kind()?);
        if a != b {
            return Ok(false);
        }
        match a {
            ValueKind::Atomic => {
                let (x, y) = (self.atomic()?, other.atomic()?);
                if x.is_null() || y.is_null() {
                    return Ok(x.is_null() && y.is_null());
                }
                if x.string_value() == y.string_value() {
                    return Ok(true);
                }
                match (x.number_value(), y.number_value()) {
                    (Some(m), Some(n)) => Ok(m == n),
                    _ => Ok(false),
                }
            }
            ValueKind::List => {
                let len = self.list_len()?;
                if len != other.list_len()? {
                    return Ok(false);
                }
                for i in 0..len {
                    if !self.list_get(i)?.value_equals(&other.list_get(i)?)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ValueKind::Object => {
                let len = self.object_len()?;
                if len != other.object_len()? {
                    return Ok(false);
                }
                for i in 0..len {
                    let Some((key, value)) = self.object_entry_at(i)? else {
                        return Ok(false);
                    };
                    match other.object_get(&key)? {
                        Some(theirs) => {
                            if !value.value_equals(&theirs)? {
                                return Ok(false);
                            }
                        }
                        None => return Ok(false),
                    }
                }
                Ok(true)
            }
        }
    }
}

impl Hash for RuntimeValue {
    /// Content hash consistent with `value_equals`: atomics hash by
    /// string representation (so text "5" and number 5 collide as they
    /// compare equal), containers hash structurally with object keys
    /// sorted for order-insensitivity.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let guard = self.0.state.read();
        if guard.closed {
            state.write_u8(0xFF);
            return;
        }
        match &guard.payload {
            Payload::Atomic(a) => {
                state.write_u8(0);
                a.string_value().hash(state);
            }
            Payload::List { items, .. } => {
                state.write_u8(1);
                state.write_usize(items.len());
                for item in items {
                    item.hash(state);
                }
            }
            Payload::Object { entries, .. } => {
                state.write_u8(2);
                state.write_usize(entries.len());
                let mut keys: Vec<_> = entries.keys().collect();
                keys.sort();
                for key in keys {
                    key.hash(state);
                    entries[key.as_str()].hash(state);
                }
            }
        }
    }
}

impl std::fmt::Debug for RuntimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.0.state.read();
        if guard.closed {
            return write!(f, "<closed>");
        }
        match &guard.payload {
            Payload::Atomic(a) => write!(f, "{a:?}"),
            Payload::List { items, .. } => write!(f, "List({} items)", items.len()),
            Payload::Object { entries, .. } => write!(f, "Object({} entries)", entries.len()),
        }
    }
}

// Deep copy

impl RuntimeValue {
    /// Produce a structurally equal, disjoint copy of this value graph.
    ///
    /// Cycle-safe: a shared node is copied once and reused by identity.
    /// Metadata extensions and binary stream handles are shared, not
    /// duplicated; they are side channels, not structure.
    pub fn deep_copy(&self) -> Result<RuntimeValue, RuntimeError> {
        let mut copies: rustc_hash::FxHashMap<usize, RuntimeValue> =
            rustc_hash::FxHashMap::default();
        self.deep_copy_inner(&mut copies)
    }

    fn deep_copy_inner(
        &self,
        copies: &mut rustc_hash::FxHashMap<usize, RuntimeValue>,
    ) -> Result<RuntimeValue, RuntimeError> {
        if let Some(existing) = copies.get(&self.ptr_id()) {
            return Ok(existing.clone());
        }
        match self.kind()? {
            ValueKind::Atomic => {
                let atomic = self.atomic()?;
                let copy = match atomic {
                    AtomicValue::Null => RuntimeValue::null(),
                    AtomicValue::Bool(b) => RuntimeValue::boolean(b),
                    other => RuntimeValue::from_payload(Payload::Atomic(other)),
                };
                Ok(copy)
            }
            ValueKind::List => {
                let copy = RuntimeValue::list(Vec::new());
                copies.insert(self.ptr_id(), copy.clone());
                let len = self.list_len()?;
                for i in 0..len {
                    let child = self.list_get(i)?.deep_copy_inner(copies)?;
                    copy.list_push(child)?;
                }
                Ok(copy)
            }
            ValueKind::Object => {
                let copy = RuntimeValue::object(Vec::new());
                copies.insert(self.ptr_id(), copy.clone());
                let len = self.object_len()?;
                for i in 0..len {
                    if let Some((key, value)) = self.object_entry_at(i)? {
                        copy.object_set(key, value.deep_copy_inner(copies)?)?;
                    }
                }
                Ok(copy)
            }
        }
    }
}
