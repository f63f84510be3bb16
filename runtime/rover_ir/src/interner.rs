//! String interner for identifier storage.
//!
//! Provides O(1) interning and lookup. The interner is shared between the
//! parser, the program-tree builder and the execution engine; wrap it in
//! `SharedInterner` to pass it across those boundaries.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::Name;

/// Interner storage: map from content to index plus the string table.
#[derive(Default)]
struct InternTable {
    map: FxHashMap<Box<str>, u32>,
    strings: Vec<Box<str>>,
}

/// String interner.
///
/// # Thread Safety
/// Uses an `RwLock` so lookups from a running robot never contend with
/// each other; interning takes the write lock only for unseen strings.
pub struct StringInterner {
    table: RwLock<InternTable>,
}

impl StringInterner {
    /// Create a new interner with the empty string pre-interned at index 0.
    pub fn new() -> Self {
        let interner = StringInterner {
            table: RwLock::new(InternTable::default()),
        };
        let empty = interner.intern("");
        debug_assert_eq!(empty, Name::EMPTY);
        interner
    }

    /// Intern a string, returning its `Name`.
    ///
    /// Interning the same content twice returns the same `Name`.
    pub fn intern(&self, s: &str) -> Name {
        if let Some(&idx) = self.table.read().map.get(s) {
            return Name::from_raw(idx);
        }
        let mut table = self.table.write();
        // Re-check under the write lock: another thread may have interned
        // the string between our read and write.
        if let Some(&idx) = table.map.get(s) {
            return Name::from_raw(idx);
        }
        let idx = u32::try_from(table.strings.len()).unwrap_or_else(|_| {
            panic!("interner exceeded capacity: {} strings", table.strings.len())
        });
        let content: Box<str> = s.into();
        table.strings.push(content.clone());
        table.map.insert(content, idx);
        Name::from_raw(idx)
    }

    /// Look up the string for a `Name`.
    ///
    /// Returns an owned `String`; `Name`s are only created by `intern`, so
    /// the index is always valid for the interner that produced it.
    pub fn lookup(&self, name: Name) -> String {
        let table = self.table.read();
        table
            .strings
            .get(name.index())
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.table.read().strings.len()
    }

    /// Whether the interner is empty (never true: "" is pre-interned).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a `StringInterner`.
pub type SharedInterner = Arc<StringInterner>;
