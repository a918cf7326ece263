//! Engine error types.

use std::fmt;

use mirra_sdk::CallError;

/// Which member category a lookup targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Constructor lookup
    Constructor,
    /// Method lookup
    Method,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemberKind::Constructor => "constructor",
            MemberKind::Method => "method",
        })
    }
}

/// Errors surfaced by scope construction, type resolution, member binding,
/// and invocation.
///
/// `Configuration` and `InvalidState` indicate caller misuse and are never
/// swallowed; `TypeNotFound`, `NoSuchMember`, and `Invocation` are expected
/// outcomes of dynamic lookup and calling — the session stays usable and
/// the caller may retry with different locations, signatures, or arguments.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid input when building a lookup scope: no locations, a
    /// malformed location string, or a location whose module library could
    /// not be opened and initialized.
    #[error("scope configuration: {0}")]
    Configuration(String),

    /// No type with the given fully qualified name in the scope chain.
    #[error("type `{name}` not found in scope")]
    TypeNotFound {
        /// The name that failed to resolve
        name: String,
    },

    /// No constructor or method matches the requested exact signature.
    #[error("type `{type_name}` has no {kind} matching `{signature}`")]
    NoSuchMember {
        /// Type that was searched
        type_name: String,
        /// Constructor or method
        kind: MemberKind,
        /// The requested signature, e.g. `add(i32, i32)`
        signature: String,
    },

    /// A session operation was called before its prerequisite load.
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    /// The bound member failed when invoked, or was invoked with an
    /// incompatible receiver or arguments.
    #[error("invocation failed: {0}")]
    Invocation(String),
}

impl From<CallError> for EngineError {
    fn from(err: CallError) -> Self {
        EngineError::Invocation(err.to_string())
    }
}
