//! Compile-time issue reporting.
//!
//! The program-tree builder reports structural problems as `Issue`s:
//! message, severity, line and originating file identity. Errors are
//! fatal (the first one aborts compilation); warnings such as deprecated
//! construct usage are collected alongside and returned with the result.

mod issue;
mod queue;

pub use issue::{
    construct_arity_mismatch, construct_default_shape_mismatch, deprecated_construct,
    function_arity_mismatch, missing_construct, unresolved_function, unresolved_include,
    unresolved_plugin, unresolved_variable, Issue, Severity,
};
pub use queue::IssueQueue;
