//! The root executable unit.
//!
//! A `Robot` holds the compiled instruction arena, the function table,
//! the main root sequence, library roots wired from include statements,
//! and named invocation arguments. Execution itself lives in `Engine`;
//! the robot exposes the structural queries tooling needs (child
//! enumeration and the breadth-first path-from-root query used for
//! breakpoint placement).

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use rover_ir::{Name, StringInterner};
use rover_value::{RuntimeError, RuntimeValue};

use crate::construct::ConstructRegistry;
use crate::exec::Engine;
use crate::program::{Function, InstId, ProgramArena};
use crate::sink::DebugSink;

/// A wired include: file identity plus the included unit's root.
#[derive(Debug)]
pub struct Library {
    pub file: Name,
    pub root: InstId,
}

/// The root executable unit of a compiled script.
pub struct Robot {
    session: u64,
    pub(crate) arena: ProgramArena,
    pub(crate) functions: Vec<Function>,
    main_file: Name,
    root: InstId,
    libraries: Vec<Library>,
    arguments: FxHashMap<String, RuntimeValue>,
}

impl Robot {
    pub(crate) fn new(
        session: u64,
        arena: ProgramArena,
        functions: Vec<Function>,
        main_file: Name,
        root: InstId,
        libraries: Vec<Library>,
    ) -> Self {
        Robot {
            session,
            arena,
            functions,
            main_file,
            root,
            libraries,
            arguments: FxHashMap::default(),
        }
    }

    /// Unique compiler-session id.
    pub fn session_id(&self) -> u64 {
        self.session
    }

    /// File identity of the main unit.
    pub fn main_file(&self) -> Name {
        self.main_file
    }

    /// Root instruction of the main unit.
    pub fn root(&self) -> InstId {
        self.root
    }

    /// Wired library includes, in include order.
    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    /// Bind a named invocation argument, replacing any previous binding.
    pub fn set_argument(&mut self, name: impl Into<String>, value: RuntimeValue) {
        value.register_reference();
        if let Some(old) = self.arguments.insert(name.into(), value) {
            if old.release_reference().is_err() {
                tracing::debug!("argument reference underflow on rebind");
            }
        }
    }

    /// Whether a named invocation argument is bound.
    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    /// The named invocation argument, if bound.
    pub fn get_argument(&self, name: &str) -> Option<RuntimeValue> {
        self.arguments.get(name).cloned()
    }

    /// All invocation arguments.
    pub fn arguments(&self) -> &FxHashMap<String, RuntimeValue> {
        &self.arguments
    }

    /// Direct children of an instruction, in evaluation order.
    pub fn children(&self, id: InstId) -> SmallVec<[InstId; 8]> {
        self.arena.children(id)
    }

    /// Breadth-first path from a root to `target`.
    ///
    /// The main root is searched first, then each library root. Returns
    /// the id chain from the searched root down to the target, inclusive.
    pub fn path_from_root(&self, target: InstId) -> Option<Vec<InstId>> {
        std::iter::once(self.root)
            .chain(self.libraries.iter().map(|l| l.root))
            .find_map(|root| self.bfs_path(root, target))
    }

    fn bfs_path(&self, root: InstId, target: InstId) -> Option<Vec<InstId>> {
        let mut parents: FxHashMap<InstId, InstId> = FxHashMap::default();
        let mut seen: FxHashSet<InstId> = FxHashSet::default();
        let mut queue = VecDeque::new();
        seen.insert(root);
        queue.push_back(root);
        while let Some(id) = queue.pop_front() {
            if id == target {
                let mut path = vec![id];
                let mut cursor = id;
                while let Some(&parent) = parents.get(&cursor) {
                    path.push(parent);
                    cursor = parent;
                }
                path.reverse();
                return Some(path);
            }
            for child in self.arena.children(id) {
                if seen.insert(child) {
                    parents.insert(child, id);
                    queue.push_back(child);
                }
            }
        }
        None
    }

    /// Run the robot to completion against a sink.
    pub fn run(
        &self,
        registry: &ConstructRegistry,
        interner: &StringInterner,
        sink: &dyn DebugSink,
    ) -> Result<(), RuntimeError> {
        Engine::new(self, registry, interner, sink).run()
    }

    /// Initialize this robot as a library: execute the library roots in
    /// include order and, unless `skip_self` is set, the robot's own
    /// top-level sequence.
    pub fn initialize_as_library(
        &self,
        registry: &ConstructRegistry,
        interner: &StringInterner,
        sink: &dyn DebugSink,
        skip_self: bool,
    ) -> Result<(), RuntimeError> {
        Engine::new(self, registry, interner, sink).initialize(skip_self)
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        for (_, value) in self.arguments.drain() {
            if value.release_reference().is_err() {
                tracing::debug!("argument reference underflow on drop");
            }
        }
    }
}

impl std::fmt::Debug for Robot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Robot")
            .field("session", &self.session)
            .field("instructions", &self.arena.len())
            .field("functions", &self.functions.len())
            .field("libraries", &self.libraries.len())
            .finish()
    }
}
