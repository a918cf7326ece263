//! Process-wide host type registry.
//!
//! Types compiled into the host program register here and become resolvable
//! through the engine's own defining scope ([`crate::Scope::root`]), which
//! every freshly built scope delegates to by default. The dynamic-library
//! path lives in [`crate::library`] and [`crate::scope`].

use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use mirra_sdk::{ModuleDef, TypeDef};

struct HostEntry {
    def: Arc<TypeDef>,
    initialized: OnceCell<()>,
}

impl HostEntry {
    fn new(def: Arc<TypeDef>) -> Self {
        HostEntry {
            def,
            initialized: OnceCell::new(),
        }
    }

    fn resolve(&self) -> Arc<TypeDef> {
        self.initialized.get_or_init(|| {
            if let Some(init) = self.def.initializer() {
                init();
            }
        });
        self.def.clone()
    }
}

static HOST_TYPES: Lazy<RwLock<FxHashMap<String, HostEntry>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// Register every type of an in-process module.
///
/// A later registration under an existing name replaces it (and a fresh
/// initializer cell comes with the new definition).
pub fn register_module(module: ModuleDef) {
    let mut table = HOST_TYPES.write();
    for (name, def) in module.into_types() {
        table.insert(name, HostEntry::new(def));
    }
}

/// Register a single in-process type.
pub fn register_type(def: TypeDef) {
    HOST_TYPES
        .write()
        .insert(def.name().to_string(), HostEntry::new(Arc::new(def)));
}

/// Whether a host type with this name is registered.
pub fn contains(name: &str) -> bool {
    HOST_TYPES.read().contains_key(name)
}

/// Look up a host type, running its initializer on first resolution.
pub(crate) fn lookup(name: &str) -> Option<Arc<TypeDef>> {
    HOST_TYPES.read().get(name).map(HostEntry::resolve)
}

/// Names of all registered host types.
pub(crate) fn type_names() -> Vec<String> {
    HOST_TYPES.read().keys().cloned().collect()
}
