//! Variable environment.
//!
//! A scope stack: the global scope at the bottom, one frame per active
//! function call on top. A function body sees its own frame and the
//! global scope, never the caller's locals.
//!
//! The environment owns the script-world references of its bindings:
//! defining registers the value, rebinding releases the old value and
//! registers the new one, popping a frame releases everything it held.

use rustc_hash::FxHashMap;

use rover_ir::Name;
use rover_value::{errors, RuntimeError, RuntimeValue};

/// A single scope of bindings.
#[derive(Default)]
struct Scope {
    bindings: FxHashMap<Name, RuntimeValue>,
}

impl Scope {
    fn release_all(&mut self) {
        for (_, value) in self.bindings.drain() {
            if value.release_reference().is_err() {
                tracing::debug!("binding reference underflow at scope exit");
            }
        }
    }
}

/// The scope stack.
pub struct Environment {
    global: Scope,
    frames: Vec<Scope>,
}

impl Environment {
    /// Create an environment with an empty global scope.
    pub fn new() -> Self {
        Environment {
            global: Scope::default(),
            frames: Vec::new(),
        }
    }

    /// Push a fresh parameter frame for a function call.
    pub fn push_frame(&mut self) {
        self.frames.push(Scope::default());
    }

    /// Pop the innermost frame, releasing every binding it held.
    pub fn pop_frame(&mut self) {
        if let Some(mut frame) = self.frames.pop() {
            frame.release_all();
        }
    }

    fn current_mut(&mut self) -> &mut Scope {
        self.frames.last_mut().unwrap_or(&mut self.global)
    }

    /// Define (or redefine) a binding in the current scope.
    ///
    /// Registers a reference on `value`; a replaced binding's reference
    /// is released.
    pub fn define(&mut self, name: Name, value: RuntimeValue) {
        value.register_reference();
        if let Some(old) = self.current_mut().bindings.insert(name, value) {
            if old.release_reference().is_err() {
                tracing::debug!("binding reference underflow on redefine");
            }
        }
    }

    /// Look up a binding: current frame first, then the global scope.
    pub fn lookup(&self, name: Name) -> Option<RuntimeValue> {
        if let Some(frame) = self.frames.last() {
            if let Some(value) = frame.bindings.get(&name) {
                return Some(value.clone());
            }
        }
        self.global.bindings.get(&name).cloned()
    }

    /// Rebind an existing variable, swapping references.
    ///
    /// The builder guarantees every assignment target was declared, so a
    /// missing binding here is a contract violation surfaced as an error.
    pub fn assign(&mut self, name: Name, value: RuntimeValue) -> Result<(), RuntimeError> {
        let scope = if self
            .frames
            .last()
            .is_some_and(|f| f.bindings.contains_key(&name))
        {
            self.frames.last_mut().unwrap_or(&mut self.global)
        } else if self.global.bindings.contains_key(&name) {
            &mut self.global
        } else {
            return Err(errors::runtime_error("assignment to undeclared variable"));
        };
        value.register_reference();
        if let Some(old) = scope.bindings.insert(name, value) {
            old.release_reference()?;
        }
        Ok(())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        while let Some(mut frame) = self.frames.pop() {
            frame.release_all();
        }
        self.global.release_all();
    }
}
