//! Error types for module calls.

/// Result type for constructor and method calls.
pub type CallResult<T> = Result<T, CallError>;

/// Error reported by module code when a constructor or method fails.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// A value had the wrong runtime type
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// An argument value was rejected
    #[error("argument error: {0}")]
    Argument(String),

    /// The call panicked
    #[error("call panicked: {0}")]
    Panic(String),

    /// General failure raised by the module
    #[error("{0}")]
    Failed(String),
}

impl From<String> for CallError {
    fn from(s: String) -> Self {
        CallError::Failed(s)
    }
}

impl From<&str> for CallError {
    fn from(s: &str) -> Self {
        CallError::Failed(s.to_string())
    }
}
