//! Mirra SDK - Lightweight SDK for writing mirra modules
//!
//! This crate provides the minimal types needed to author a mirra module
//! without depending on the engine: the erased [`Value`] model, exact-match
//! parameter signatures ([`TypeTag`]), instance handles, and the
//! [`ModuleDef`]/[`TypeDef`] registration builders.
//!
//! A module is a named set of types. Each type declares constructors and
//! methods keyed by an ordered parameter-type signature; the engine binds
//! members by exact signature match and calls through plain function
//! pointers. Compiled as a `cdylib`, a module exports its definition through
//! the `mirra_module_init` entry point:
//!
//! ```ignore
//! use mirra_sdk::{declare_module, CallResult, Instance, ModuleDef, TypeDef, TypeTag, Value};
//!
//! fn sum(_recv: Option<&Instance>, args: &[Value]) -> CallResult<Value> {
//!     let a = args[0].as_i32().ok_or("expected i32")?;
//!     let b = args[1].as_i32().ok_or("expected i32")?;
//!     Ok(Value::I32(a + b))
//! }
//!
//! fn init() -> ModuleDef {
//!     let mut module = ModuleDef::new("math", "1.0.0");
//!     let mut ty = TypeDef::new("math.Adder");
//!     ty.register_static_method("sum", &[TypeTag::I32, TypeTag::I32], sum);
//!     module.register_type(ty);
//!     module
//! }
//!
//! declare_module!(init);
//! ```

#![warn(missing_docs)]

mod error;
mod instance;
mod module;
mod value;

pub use error::{CallError, CallResult};
pub use instance::Instance;
pub use module::{
    ConstructorDef, ConstructorFn, MethodDef, MethodFn, ModuleDef, TypeDef, TypeInitFn,
};
pub use value::{display_signature, TypeTag, Value};
