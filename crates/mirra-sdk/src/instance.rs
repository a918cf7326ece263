//! Instance handles produced by constructor invocation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Handle to state constructed by a module's constructor.
///
/// Cloning is cheap; the underlying state is shared. Mutation happens
/// through interior mutability inside the module's own state type, so an
/// instance can be used as the receiver of many method calls.
#[derive(Clone)]
pub struct Instance {
    type_name: Arc<str>,
    state: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    /// Wrap freshly constructed state under the given type name.
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<Arc<str>>, state: T) -> Self {
        Instance {
            type_name: type_name.into(),
            state: Arc::new(state),
        }
    }

    /// Fully qualified name of the type this instance was constructed from.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Borrow the state as a concrete type.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.type_name)
    }
}

/// Two handles are equal when they share the same underlying state.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}
