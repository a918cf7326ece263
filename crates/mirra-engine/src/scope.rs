//! Lookup scopes — isolated, delegating type namespaces.
//!
//! A scope is built once from a set of module locations (or in-process
//! module definitions) and is read-only afterwards: resolution never
//! mutates it beyond each type's one-shot initializer cell, so a built
//! scope can be shared across sessions and threads behind its `Arc`.
//!
//! Values and instances produced by a scope's modules execute code owned
//! by that scope's libraries; keep the scope alive while such values are
//! live.

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use rustc_hash::FxHashMap;
use url::Url;

use mirra_sdk::{ModuleDef, TypeDef};

use crate::error::EngineError;
use crate::library::Library;
use crate::registry;

struct TypeEntry {
    def: Arc<TypeDef>,
    initialized: OnceCell<()>,
}

/// An isolated type namespace with optional delegation to a parent.
///
/// Resolution is local-first: names the scope cannot resolve itself are
/// delegated up the ancestor chain.
pub struct Scope {
    parent: Option<Arc<Scope>>,
    types: FxHashMap<String, TypeEntry>,
    /// Open library handles backing `types`; held so the function pointers
    /// inside the type definitions stay valid for the scope's lifetime.
    _libraries: Vec<Library>,
    /// The root scope resolves through the process-wide host registry
    /// instead of a fixed local table.
    host_backed: bool,
}

impl Scope {
    /// The engine's own defining scope: resolves types registered by the
    /// host process (see [`crate::registry`]). Used as the default parent
    /// for new scopes and as the initial scope of a fresh session.
    pub fn root() -> Arc<Scope> {
        static ROOT: Lazy<Arc<Scope>> = Lazy::new(|| {
            Arc::new(Scope {
                parent: None,
                types: FxHashMap::default(),
                _libraries: Vec::new(),
                host_backed: true,
            })
        });
        ROOT.clone()
    }

    /// Build a scope by opening one module library per location.
    ///
    /// Locations are `file:` URLs. At least one is required; a malformed
    /// or unloadable location fails the whole construction. When
    /// `parent` is `None` the root scope is the delegation target.
    ///
    /// Acquires OS-level library handles that stay open for the scope's
    /// lifetime.
    pub fn from_locations<S: AsRef<str>>(
        parent: Option<Arc<Scope>>,
        locations: &[S],
    ) -> Result<Arc<Scope>, EngineError> {
        if locations.is_empty() {
            return Err(EngineError::Configuration(
                "at least one location required".to_string(),
            ));
        }

        let mut libraries = Vec::with_capacity(locations.len());
        let mut modules = Vec::with_capacity(locations.len());
        for location in locations {
            let location = location.as_ref();
            let path = location_to_path(location)?;
            let library = Library::open(&path).map_err(|e| {
                EngineError::Configuration(format!("cannot load module from `{}`: {}", location, e))
            })?;
            let module = library.load_module().map_err(|e| {
                EngineError::Configuration(format!("cannot load module from `{}`: {}", location, e))
            })?;
            libraries.push(library);
            modules.push(module);
        }

        Ok(Scope::assemble(parent, modules, libraries))
    }

    /// Build a scope from in-process module definitions.
    ///
    /// This is the seam the library loader feeds after `dlopen`, and the
    /// way hosts plug any other module source into the engine.
    pub fn from_modules(
        parent: Option<Arc<Scope>>,
        modules: impl IntoIterator<Item = ModuleDef>,
    ) -> Arc<Scope> {
        Scope::assemble(parent, modules.into_iter().collect(), Vec::new())
    }

    fn assemble(
        parent: Option<Arc<Scope>>,
        modules: Vec<ModuleDef>,
        libraries: Vec<Library>,
    ) -> Arc<Scope> {
        let parent = Some(parent.unwrap_or_else(Scope::root));
        let mut types = FxHashMap::default();
        for module in modules {
            for (name, def) in module.into_types() {
                // First location wins on duplicate names, matching the
                // search order of the location list.
                types.entry(name).or_insert_with(|| TypeEntry {
                    def,
                    initialized: OnceCell::new(),
                });
            }
        }

        Arc::new(Scope {
            parent,
            types,
            _libraries: libraries,
            host_backed: false,
        })
    }

    /// Resolve a fully qualified type name, local first, then through the
    /// ancestor chain.
    ///
    /// The returned handle is bound to this scope and keeps it (and its
    /// libraries) alive. A type's initializer runs at its first resolution
    /// within the defining scope.
    pub fn resolve(self: &Arc<Self>, name: &str) -> Result<TypeHandle, EngineError> {
        let mut scope: &Arc<Scope> = self;
        loop {
            if let Some(def) = scope.resolve_local(name) {
                return Ok(TypeHandle {
                    def,
                    scope: self.clone(),
                });
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => {
                    return Err(EngineError::TypeNotFound {
                        name: name.to_string(),
                    })
                }
            }
        }
    }

    fn resolve_local(&self, name: &str) -> Option<Arc<TypeDef>> {
        if self.host_backed {
            return registry::lookup(name);
        }
        let entry = self.types.get(name)?;
        entry.initialized.get_or_init(|| {
            if let Some(init) = entry.def.initializer() {
                init();
            }
        });
        Some(entry.def.clone())
    }

    /// Names of the types defined directly in this scope, ancestors
    /// excluded.
    pub fn type_names(&self) -> Vec<String> {
        if self.host_backed {
            return registry::type_names();
        }
        self.types.keys().cloned().collect()
    }

    /// The delegation target, `None` only for the root scope.
    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }
}

/// Handle to a resolved type, bound to the scope it was resolved from.
#[derive(Clone)]
pub struct TypeHandle {
    def: Arc<TypeDef>,
    scope: Arc<Scope>,
}

impl TypeHandle {
    /// The resolved type definition.
    pub fn def(&self) -> &Arc<TypeDef> {
        &self.def
    }

    /// Fully qualified name of the resolved type.
    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// The scope this handle was resolved from.
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }
}

fn location_to_path(location: &str) -> Result<PathBuf, EngineError> {
    let url = Url::parse(location).map_err(|e| {
        EngineError::Configuration(format!("malformed location `{}`: {}", location, e))
    })?;
    if url.scheme() != "file" {
        return Err(EngineError::Configuration(format!(
            "unsupported scheme `{}` in location `{}`",
            url.scheme(),
            location
        )));
    }
    url.to_file_path().map_err(|_| {
        EngineError::Configuration(format!(
            "malformed location `{}`: not a local file path",
            location
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn module_with(names: &[&str]) -> ModuleDef {
        let mut module = ModuleDef::new("test", "0.0.0");
        for name in names {
            module.register_type(TypeDef::new(*name));
        }
        module
    }

    #[test]
    fn test_zero_locations_is_a_configuration_error() {
        let locations: [&str; 0] = [];
        let result = Scope::from_locations(None, &locations);
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_malformed_location_is_a_configuration_error() {
        for bad in ["not a url", "relative/path.so", "http://host/lib.so"] {
            let result = Scope::from_locations(None, &[bad]);
            assert!(
                matches!(result, Err(EngineError::Configuration(_))),
                "location {:?} should fail scope construction",
                bad
            );
        }
    }

    #[test]
    fn test_unloadable_location_is_a_configuration_error() {
        let result = Scope::from_locations(None, &["file:///nonexistent/libmod.so"]);
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_resolve_local_then_parent() {
        let parent = Scope::from_modules(None, [module_with(&["p.Only"])]);
        let child = Scope::from_modules(Some(parent), [module_with(&["c.Only"])]);

        assert_eq!(child.resolve("c.Only").unwrap().name(), "c.Only");
        assert_eq!(child.resolve("p.Only").unwrap().name(), "p.Only");
        assert!(matches!(
            child.resolve("neither.Here"),
            Err(EngineError::TypeNotFound { .. })
        ));
    }

    #[test]
    fn test_local_definition_shadows_parent() {
        static PARENT_INIT: AtomicUsize = AtomicUsize::new(0);

        let mut parent_module = ModuleDef::new("p", "0.0.0");
        parent_module.register_type(
            TypeDef::new("shared.Name").with_initializer(|| {
                PARENT_INIT.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let parent = Scope::from_modules(None, [parent_module]);

        let mut child_module = ModuleDef::new("c", "0.0.0");
        let mut local = TypeDef::new("shared.Name");
        local.register_method("local_marker", &[], |_recv, _args| {
            Ok(mirra_sdk::Value::Null)
        });
        child_module.register_type(local);
        let child = Scope::from_modules(Some(parent), [child_module]);

        let handle = child.resolve("shared.Name").unwrap();
        assert_eq!(handle.def().methods().len(), 1);
        // The parent's definition was never touched
        assert_eq!(PARENT_INIT.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_initializer_runs_once_per_scope() {
        static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut module = ModuleDef::new("init", "0.0.0");
        module.register_type(TypeDef::new("init.Target").with_initializer(|| {
            INIT_CALLS.fetch_add(1, Ordering::SeqCst);
        }));
        let scope = Scope::from_modules(None, [module]);

        scope.resolve("init.Target").unwrap();
        scope.resolve("init.Target").unwrap();
        scope.resolve("init.Target").unwrap();
        assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_module_wins_on_duplicate_names() {
        let mut first = ModuleDef::new("first", "0.0.0");
        let mut ty = TypeDef::new("dup.Name");
        ty.register_method("from_first", &[], |_recv, _args| Ok(mirra_sdk::Value::Null));
        first.register_type(ty);

        let second = module_with(&["dup.Name"]);

        let scope = Scope::from_modules(None, [first, second]);
        let handle = scope.resolve("dup.Name").unwrap();
        assert_eq!(handle.def().methods().len(), 1);
    }

    #[test]
    fn test_root_scope_resolves_registered_host_types() {
        registry::register_type(TypeDef::new("scope.HostResident"));
        let handle = Scope::root().resolve("scope.HostResident").unwrap();
        assert_eq!(handle.name(), "scope.HostResident");
    }

    #[test]
    fn test_type_handle_reports_origin_scope() {
        let parent = Scope::from_modules(None, [module_with(&["p.Deep"])]);
        let child = Scope::from_modules(Some(parent), [module_with(&["c.Shallow"])]);

        let handle = child.resolve("p.Deep").unwrap();
        assert!(Arc::ptr_eq(handle.scope(), &child));
    }

    #[test]
    fn test_location_to_path() {
        assert!(location_to_path("file:///tmp/libdemo.so").is_ok());
        assert!(location_to_path("ftp://host/libdemo.so").is_err());
        assert!(location_to_path("/tmp/libdemo.so").is_err());
    }
}
