//! Issue type and factory constructors.
//!
//! Factory functions are the public API: one per compile-error kind, so
//! messages stay uniform and call sites stay grep-able.

use std::fmt;

use rover_ir::{Name, Position};

/// Issue severity.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Severity {
    /// Non-fatal; compilation continues.
    Warning,
    /// Fatal; the first error aborts compilation.
    Error,
}

/// A compile-time issue: severity, message, line, file identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    /// 1-based line; 0 when no source location applies.
    pub line: u32,
    /// Interned identity of the originating file.
    pub file: Name,
}

impl Issue {
    /// Create an error issue.
    pub fn error(message: impl Into<String>, position: Position) -> Self {
        Issue {
            severity: Severity::Error,
            message: message.into(),
            line: position.line,
            file: position.file,
        }
    }

    /// Create a warning issue.
    pub fn warning(message: impl Into<String>, position: Position) -> Self {
        Issue {
            severity: Severity::Warning,
            message: message.into(),
            line: position.line,
            file: position.file,
        }
    }

    /// Whether this issue aborts compilation.
    pub const fn is_fatal(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{tag}: {} (line {})", self.message, self.line)
    }
}

// Factory constructors (one per compile-error kind)

/// A plugin was referenced without being registered or used.
pub fn unresolved_plugin(plugin: &str, position: Position) -> Issue {
    Issue::error(format!("unresolved plugin '{plugin}'"), position)
}

/// A construct name did not resolve inside its plugin.
pub fn missing_construct(plugin: &str, construct: &str, position: Position) -> Issue {
    Issue::error(
        format!("plugin '{plugin}' has no construct '{construct}'"),
        position,
    )
}

/// A construct call supplied too few or too many arguments.
pub fn construct_arity_mismatch(
    construct: &str,
    expected: usize,
    got: usize,
    position: Position,
) -> Issue {
    Issue::error(
        format!("construct '{construct}' takes {expected} arguments, got {got}"),
        position,
    )
}

/// No default fits the declared shapes of an omitted optional argument.
pub fn construct_default_shape_mismatch(
    construct: &str,
    argument: &str,
    position: Position,
) -> Issue {
    Issue::error(
        format!("construct '{construct}': no default value fits the accepted shapes of argument '{argument}'"),
        position,
    )
}

/// A variable was referenced before any declaration.
pub fn unresolved_variable(name: &str, position: Position) -> Issue {
    Issue::error(format!("unresolved variable '{name}'"), position)
}

/// A function reference never resolved, even after the fixup pass.
pub fn unresolved_function(name: &str, position: Position) -> Issue {
    Issue::error(format!("unresolved function '{name}'"), position)
}

/// A function call's argument count does not match the declaration.
pub fn function_arity_mismatch(
    name: &str,
    expected: usize,
    got: usize,
    position: Position,
) -> Issue {
    Issue::error(
        format!("function '{name}' takes {expected} arguments, got {got}"),
        position,
    )
}

/// An include statement matched no compiled source unit.
pub fn unresolved_include(file: &str, position: Position) -> Issue {
    Issue::error(format!("unresolved include '{file}'"), position)
}

/// Non-fatal: a deprecated construct is still in use.
pub fn deprecated_construct(plugin: &str, construct: &str, position: Position) -> Issue {
    Issue::warning(
        format!("construct '{plugin}.{construct}' is deprecated"),
        position,
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_error_carries_position() {
        let pos = Position::new(Name::from_raw(3), 12);
        let issue = unresolved_variable("total", pos);
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.line, 12);
        assert_eq!(issue.file, Name::from_raw(3));
        assert!(issue.is_fatal());
    }

    #[test]
    fn test_deprecation_is_warning() {
        let issue = deprecated_construct("db", "rawQuery", Position::DUMMY);
        assert_eq!(issue.severity, Severity::Warning);
        assert!(!issue.is_fatal());
    }

    #[test]
    fn test_display_format() {
        let pos = Position::new(Name::EMPTY, 4);
        let issue = missing_construct("excel", "openSheet", pos);
        assert_eq!(
            issue.to_string(),
            "error: plugin 'excel' has no construct 'openSheet' (line 4)"
        );
    }
}
