//! Type and module definitions.
//!
//! A [`ModuleDef`] is what a module hands to the engine: a named, versioned
//! set of [`TypeDef`]s. Each type declares its constructors and methods with
//! ordered parameter-type signatures; the engine binds members by exact
//! signature match and dispatches through plain function pointers, so
//! definitions stay FFI-friendly and `Copy`-cheap to call.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::CallResult;
use crate::instance::Instance;
use crate::value::{display_signature, TypeTag, Value};

/// Constructor implementation: arguments in, fresh instance out.
pub type ConstructorFn = fn(&[Value]) -> CallResult<Instance>;

/// Method implementation. The receiver is `None` for static dispatch; the
/// engine guarantees `Some` for non-static methods.
pub type MethodFn = fn(Option<&Instance>, &[Value]) -> CallResult<Value>;

/// One-time type initializer, run at first resolution within a scope.
pub type TypeInitFn = fn();

/// A specific constructor of a type, selected by exact parameter signature.
#[derive(Debug)]
pub struct ConstructorDef {
    params: Vec<TypeTag>,
    call: ConstructorFn,
}

impl ConstructorDef {
    /// Define a constructor over the given parameter signature.
    pub fn new(params: &[TypeTag], call: ConstructorFn) -> Self {
        ConstructorDef {
            params: params.to_vec(),
            call,
        }
    }

    /// Ordered parameter signature.
    pub fn params(&self) -> &[TypeTag] {
        &self.params
    }

    /// Invoke the constructor.
    pub fn call(&self, args: &[Value]) -> CallResult<Instance> {
        (self.call)(args)
    }
}

/// A specific method of a type, selected by name and exact parameter
/// signature.
#[derive(Debug)]
pub struct MethodDef {
    name: String,
    params: Vec<TypeTag>,
    is_static: bool,
    call: MethodFn,
}

impl MethodDef {
    /// Define an instance method.
    pub fn new(name: impl Into<String>, params: &[TypeTag], call: MethodFn) -> Self {
        MethodDef {
            name: name.into(),
            params: params.to_vec(),
            is_static: false,
            call,
        }
    }

    /// Define a static method (invoked without a receiver).
    pub fn new_static(name: impl Into<String>, params: &[TypeTag], call: MethodFn) -> Self {
        MethodDef {
            is_static: true,
            ..MethodDef::new(name, params, call)
        }
    }

    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered parameter signature.
    pub fn params(&self) -> &[TypeTag] {
        &self.params
    }

    /// Whether the method dispatches without a receiver.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Exact match on name plus ordered signature.
    pub fn matches(&self, name: &str, params: &[TypeTag]) -> bool {
        self.name == name && self.params.as_slice() == params
    }

    /// Render as `name(i32, str)` for listings and error messages.
    pub fn display(&self) -> String {
        format!("{}{}", self.name, display_signature(&self.params))
    }

    /// Invoke the method.
    pub fn call(&self, receiver: Option<&Instance>, args: &[Value]) -> CallResult<Value> {
        (self.call)(receiver, args)
    }
}

/// A resolvable type: fully qualified name, constructors, methods, and an
/// optional one-time initializer.
#[derive(Debug, Default)]
pub struct TypeDef {
    name: String,
    constructors: Vec<Arc<ConstructorDef>>,
    methods: Vec<Arc<MethodDef>>,
    initializer: Option<TypeInitFn>,
}

impl TypeDef {
    /// Create an empty type definition under a fully qualified name.
    pub fn new(name: impl Into<String>) -> Self {
        TypeDef {
            name: name.into(),
            ..TypeDef::default()
        }
    }

    /// Attach a one-time initializer, run at first resolution per scope.
    pub fn with_initializer(mut self, init: TypeInitFn) -> Self {
        self.initializer = Some(init);
        self
    }

    /// Register a constructor.
    pub fn register_constructor(&mut self, params: &[TypeTag], call: ConstructorFn) {
        self.constructors.push(Arc::new(ConstructorDef::new(params, call)));
    }

    /// Register an instance method.
    pub fn register_method(&mut self, name: &str, params: &[TypeTag], call: MethodFn) {
        self.methods.push(Arc::new(MethodDef::new(name, params, call)));
    }

    /// Register a static method.
    pub fn register_static_method(&mut self, name: &str, params: &[TypeTag], call: MethodFn) {
        self.methods.push(Arc::new(MethodDef::new_static(name, params, call)));
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All declared constructors, in registration order.
    pub fn constructors(&self) -> &[Arc<ConstructorDef>] {
        &self.constructors
    }

    /// All declared methods, in registration order.
    pub fn methods(&self) -> &[Arc<MethodDef>] {
        &self.methods
    }

    /// The one-time initializer, if any.
    pub fn initializer(&self) -> Option<TypeInitFn> {
        self.initializer
    }

    /// Find the constructor with exactly this parameter signature.
    pub fn find_constructor(&self, params: &[TypeTag]) -> Option<Arc<ConstructorDef>> {
        self.constructors
            .iter()
            .find(|c| c.params() == params)
            .cloned()
    }

    /// Find the method with exactly this name and parameter signature.
    pub fn find_method(&self, name: &str, params: &[TypeTag]) -> Option<Arc<MethodDef>> {
        self.methods.iter().find(|m| m.matches(name, params)).cloned()
    }
}

/// A named, versioned set of type definitions — what `mirra_module_init`
/// returns.
#[derive(Debug)]
pub struct ModuleDef {
    name: String,
    version: String,
    types: FxHashMap<String, Arc<TypeDef>>,
}

impl ModuleDef {
    /// Create an empty module.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        ModuleDef {
            name: name.into(),
            version: version.into(),
            types: FxHashMap::default(),
        }
    }

    /// Register a type. A later registration under the same name replaces
    /// the earlier one.
    pub fn register_type(&mut self, ty: TypeDef) {
        self.types.insert(ty.name().to_string(), Arc::new(ty));
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Number of types defined by this module.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Look up a type by fully qualified name.
    pub fn get_type(&self, name: &str) -> Option<&Arc<TypeDef>> {
        self.types.get(name)
    }

    /// Iterate all defined types.
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDef>> {
        self.types.values()
    }

    /// Consume the module into its name/type pairs.
    pub fn into_types(self) -> impl Iterator<Item = (String, Arc<TypeDef>)> {
        self.types.into_iter()
    }
}

/// Export a module definition through the C ABI.
///
/// Expands to the `mirra_module_init` entry point the engine's library
/// loader resolves and calls; ownership of the boxed [`ModuleDef`] passes
/// to the engine.
///
/// ```ignore
/// fn init() -> ModuleDef { ... }
/// declare_module!(init);
/// ```
#[macro_export]
macro_rules! declare_module {
    ($init:path) => {
        #[no_mangle]
        pub extern "C" fn mirra_module_init() -> *mut $crate::ModuleDef {
            let module: $crate::ModuleDef = $init();
            Box::into_raw(Box::new(module))
        }
    };
}
