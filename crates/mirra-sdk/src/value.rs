//! Erased values and parameter-type tags.
//!
//! `Value` is the only shape that crosses the engine boundary: module code
//! receives `&[Value]` and returns a `Value`, with the caller responsible
//! for knowing and asserting the expected shape via the `as_*` accessors.

use std::fmt;

use crate::instance::Instance;

/// Parameter-type identifier used in exact-match member signatures.
///
/// Member lookup compares the ordered tag sequence exactly: no widening and
/// no best-match search. In particular `I32` and `I64` are distinct, so a
/// member declared over `(I32)` is not found when looked up with `(I64)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Boolean parameter
    Bool,
    /// 32-bit signed integer parameter
    I32,
    /// 64-bit signed integer parameter
    I64,
    /// Double-precision float parameter
    F64,
    /// String parameter
    Str,
    /// Instance-handle parameter
    Handle,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeTag::Bool => "bool",
            TypeTag::I32 => "i32",
            TypeTag::I64 => "i64",
            TypeTag::F64 => "f64",
            TypeTag::Str => "str",
            TypeTag::Handle => "handle",
        })
    }
}

/// Render a parameter list as `(i32, i64)` for lookups and error messages.
pub fn display_signature(params: &[TypeTag]) -> String {
    let inner: Vec<String> = params.iter().map(|t| t.to_string()).collect();
    format!("({})", inner.join(", "))
}

/// An erased argument or result value.
///
/// `Handle` carries a constructed instance, which lets the result of one
/// invocation feed a later constructor or method call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value; also the result of void methods
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// Double-precision float
    F64(f64),
    /// Owned string
    Str(String),
    /// Handle to a constructed instance
    Handle(Instance),
}

impl Value {
    /// Whether this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Read as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Read as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read as an instance handle.
    pub fn as_handle(&self) -> Option<&Instance> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Name of this value's runtime type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Str(_) => "str",
            Value::Handle(_) => "handle",
        }
    }

    /// Whether this value can bind to a parameter slot with the given tag.
    ///
    /// `Null` binds to `Str` and `Handle` slots only; primitive slots must
    /// be given a concrete value.
    pub fn binds_to(&self, tag: TypeTag) -> bool {
        match (self, tag) {
            (Value::Null, TypeTag::Str | TypeTag::Handle) => true,
            (Value::Bool(_), TypeTag::Bool) => true,
            (Value::I32(_), TypeTag::I32) => true,
            (Value::I64(_), TypeTag::I64) => true,
            (Value::F64(_), TypeTag::F64) => true,
            (Value::Str(_), TypeTag::Str) => true,
            (Value::Handle(_), TypeTag::Handle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I32(i) => write!(f, "{}", i),
            Value::I64(i) => write!(f, "{}", i),
            Value::F64(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Handle(h) => write!(f, "<{} instance>", h.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::I64(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Instance> for Value {
    fn from(h: Instance) -> Self {
        Value::Handle(h)
    }
}
