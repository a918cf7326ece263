//! Mirra engine: dynamic module loading and reflective invocation.
//!
//! The engine locates and invokes code that is not known at build time.
//! Modules — shared libraries exporting a `mirra_module_init` entry point,
//! or [`mirra_sdk::ModuleDef`]s registered in-process — are assembled into
//! isolated, delegating [`Scope`]s, and a [`Session`] drives the staged
//! resolution of a type, a constructor, an instance, and a method, ending
//! in an invocation:
//!
//! ```ignore
//! use mirra_engine::Session;
//! use mirra_sdk::{TypeTag, Value};
//!
//! let mut session = Session::new();
//! session.load_type_from("hello.Greeter", &["file:///opt/mods/libhello.so"])?;
//! session.load_constructor(&[])?;
//! session.load_instance(&[])?;
//! session.load_method("greet", &[TypeTag::Str])?;
//! let greeting = session.invoke(&[Value::from("mirra")])?;
//! ```
//!
//! Every stage validates its prerequisite and reports failures as
//! [`EngineError`] values; nothing is printed or swallowed inside the
//! engine.

pub mod error;
pub mod library;
pub mod registry;
pub mod scope;
pub mod session;

pub use error::{EngineError, MemberKind};
pub use library::{Library, LoadError, MODULE_INIT_SYMBOL};
pub use scope::{Scope, TypeHandle};
pub use session::{Session, SessionState};

// Re-export the SDK so hosts can use a single dependency.
pub use mirra_sdk as sdk;
