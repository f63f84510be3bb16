//! Construct dispatch: the boundary protocol for native capabilities.
//!
//! A construct declares an ordered list of formal arguments (name,
//! optional author default, accepted shapes) and a native processing
//! function. The registry is keyed plugin namespace then construct name
//! and is read-only once robots start executing.

use rustc_hash::{FxHashMap, FxHashSet};

use rover_ir::{Position, StringInterner};
use rover_value::{NativeNode, RuntimeError, RuntimeValue, ValueKind};

use crate::program::ConstructId;
use crate::sink::DebugSink;

/// Accepted value shapes of a formal argument.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ShapeSet {
    pub atomic: bool,
    pub list: bool,
    pub object: bool,
}

impl ShapeSet {
    /// Accepts every shape.
    pub const ANY: ShapeSet = ShapeSet {
        atomic: true,
        list: true,
        object: true,
    };

    /// Accepts only the given shapes.
    pub fn only(kinds: &[ValueKind]) -> Self {
        let mut set = ShapeSet {
            atomic: false,
            list: false,
            object: false,
        };
        for kind in kinds {
            match kind {
                ValueKind::Atomic => set.atomic = true,
                ValueKind::List => set.list = true,
                ValueKind::Object => set.object = true,
            }
        }
        set
    }

    /// Whether `kind` is accepted.
    pub const fn accepts(self, kind: ValueKind) -> bool {
        match kind {
            ValueKind::Atomic => self.atomic,
            ValueKind::List => self.list,
            ValueKind::Object => self.object,
        }
    }
}

/// The shape of a native default value.
pub(crate) fn native_shape(node: &NativeNode) -> ValueKind {
    match node {
        NativeNode::Null
        | NativeNode::Bool(_)
        | NativeNode::Number(_)
        | NativeNode::Text(_) => ValueKind::Atomic,
        NativeNode::List(_) => ValueKind::List,
        NativeNode::Object(_) => ValueKind::Object,
    }
}

/// Formal argument of a construct.
pub struct ConstructArg {
    pub name: String,
    /// Author-supplied default, materialized at call time when the call
    /// site omits this trailing argument.
    pub default: Option<NativeNode>,
    pub shapes: ShapeSet,
}

impl ConstructArg {
    /// Formal argument accepting any shape, with no default.
    pub fn new(name: impl Into<String>) -> Self {
        ConstructArg {
            name: name.into(),
            default: None,
            shapes: ShapeSet::ANY,
        }
    }

    /// Restrict accepted shapes.
    pub fn with_shapes(mut self, shapes: ShapeSet) -> Self {
        self.shapes = shapes;
        self
    }

    /// Attach an author default.
    pub fn with_default(mut self, default: NativeNode) -> Self {
        self.default = Some(default);
        self
    }
}

/// Execution context handed to a construct's processing function.
pub struct ConstructContext<'a> {
    pub sink: &'a dyn DebugSink,
    pub interner: &'a StringInterner,
    /// The running robot's invocation arguments.
    pub arguments: &'a FxHashMap<String, RuntimeValue>,
    /// Source position of the call site.
    pub position: Position,
}

impl ConstructContext<'_> {
    /// Emit textual output through the debugger sink.
    pub fn emit(&self, text: &str) {
        self.sink.output(self.position, text);
    }
}

/// Native processing function of a construct.
pub type ConstructFn = Box<
    dyn Fn(&mut ConstructContext<'_>, Vec<RuntimeValue>) -> Result<RuntimeValue, RuntimeError>
        + Send
        + Sync,
>;

/// A named native capability callable from script code.
pub struct Construct {
    pub name: String,
    pub args: Vec<ConstructArg>,
    pub deprecated: bool,
    handler: ConstructFn,
}

impl Construct {
    /// Create a construct.
    pub fn new(name: impl Into<String>, args: Vec<ConstructArg>, handler: ConstructFn) -> Self {
        Construct {
            name: name.into(),
            args,
            deprecated: false,
            handler,
        }
    }

    /// Mark as deprecated; call sites compile with a warning.
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Invoke the native processing function.
    pub fn invoke(
        &self,
        cx: &mut ConstructContext<'_>,
        args: Vec<RuntimeValue>,
    ) -> Result<RuntimeValue, RuntimeError> {
        (self.handler)(cx, args)
    }
}

impl std::fmt::Debug for Construct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Construct({}, {} args)", self.name, self.args.len())
    }
}

/// Registry of constructs, keyed plugin namespace then construct name.
///
/// Populated during host initialization, then shared read-only by every
/// robot.
#[derive(Default)]
pub struct ConstructRegistry {
    plugins: FxHashSet<String>,
    constructs: Vec<Construct>,
    index: FxHashMap<(String, String), ConstructId>,
}

impl ConstructRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ConstructRegistry::default()
    }

    /// Register a plugin namespace with no constructs yet.
    pub fn register_plugin(&mut self, plugin: impl Into<String>) {
        self.plugins.insert(plugin.into());
    }

    /// Register a construct under a plugin namespace.
    pub fn register(&mut self, plugin: impl Into<String>, construct: Construct) -> ConstructId {
        let plugin = plugin.into();
        self.plugins.insert(plugin.clone());
        let id = ConstructId(
            u32::try_from(self.constructs.len())
                .unwrap_or_else(|_| panic!("construct registry exceeded capacity")),
        );
        self.index.insert((plugin, construct.name.clone()), id);
        self.constructs.push(construct);
        id
    }

    /// Whether a plugin namespace exists.
    pub fn has_plugin(&self, plugin: &str) -> bool {
        self.plugins.contains(plugin)
    }

    /// Resolve a construct by plugin and name.
    pub fn lookup(&self, plugin: &str, name: &str) -> Option<ConstructId> {
        self.index
            .get(&(plugin.to_string(), name.to_string()))
            .copied()
    }

    /// Get a construct by id.
    pub fn get(&self, id: ConstructId) -> &Construct {
        &self.constructs[id.index()]
    }
}
