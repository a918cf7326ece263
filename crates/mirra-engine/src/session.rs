//! Reflective invocation sessions.
//!
//! A [`Session`] walks the stages of a dynamic call: resolve a type, bind
//! a constructor, produce an instance, bind a method, invoke. Intermediate
//! handles are held in the session, so a resolved type or constructed
//! instance is reused across any number of subsequent calls:
//!
//! ```ignore
//! use mirra_engine::Session;
//! use mirra_sdk::{TypeTag, Value};
//!
//! let mut session = Session::new();
//! session.load_type_from("demo.Calculator", &["file:///opt/mods/libdemo.so"])?;
//! session.load_constructor(&[])?;
//! session.load_instance(&[])?;
//! session.load_method("add", &[TypeTag::I32, TypeTag::I32])?;
//! let sum = session.invoke(&[Value::I32(2), Value::I32(3)])?;
//!
//! // Pivot to another method on the same instance
//! session.load_method("reset", &[])?;
//! session.invoke(&[])?;
//! ```
//!
//! The constructor/instance steps can be skipped entirely when the target
//! method is static. Loading a new type clears every downstream handle —
//! constructor, instance, and method were all bound against the previous
//! type and would be stale.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use mirra_sdk::{
    display_signature, CallResult, ConstructorDef, Instance, MethodDef, TypeTag, Value,
};

use crate::error::{EngineError, MemberKind};
use crate::scope::{Scope, TypeHandle};

/// The furthest stage of the invocation chain a session has bound, named
/// by which handles are currently valid.
///
/// `invoke` is legal only in `MethodLoaded`. The constructor/instance
/// stages are skipped for static call chains, so `MethodLoaded` does not
/// imply an instance is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing bound
    Empty,
    /// A type is resolved
    TypeLoaded,
    /// A constructor is bound
    ConstructorLoaded,
    /// An instance is constructed
    InstanceReady,
    /// A method is bound; `invoke` is legal
    MethodLoaded,
}

/// A stateful resolution-and-invocation cursor.
///
/// Not meant for concurrent use: simultaneous loads from two threads would
/// race on the held handles. Use one session per thread; the underlying
/// [`Scope`] can be shared freely.
pub struct Session {
    scope: Arc<Scope>,
    class: Option<TypeHandle>,
    constructor: Option<Arc<ConstructorDef>>,
    instance: Option<Instance>,
    method: Option<Arc<MethodDef>>,
}

impl Session {
    /// Create a session resolving against the root scope.
    pub fn new() -> Self {
        Session::with_scope(Scope::root())
    }

    /// Create a session resolving against the given scope.
    pub fn with_scope(scope: Arc<Scope>) -> Self {
        Session {
            scope,
            class: None,
            constructor: None,
            instance: None,
            method: None,
        }
    }

    /// Replace the held scope with one built from `locations`, delegating
    /// to the root scope. Subsequent [`Session::load_type`] calls resolve
    /// in it.
    pub fn load_scope<S: AsRef<str>>(&mut self, locations: &[S]) -> Result<(), EngineError> {
        self.scope = Scope::from_locations(None, locations)?;
        Ok(())
    }

    /// Replace the held scope with one built from `locations`, delegating
    /// to an explicit parent.
    pub fn load_scope_with_parent<S: AsRef<str>>(
        &mut self,
        parent: Arc<Scope>,
        locations: &[S],
    ) -> Result<(), EngineError> {
        self.scope = Scope::from_locations(Some(parent), locations)?;
        Ok(())
    }

    /// Resolve `name` in the held scope and store it as the session's
    /// type.
    ///
    /// The type, constructor, instance, and method handles are cleared
    /// before resolving — also when resolution then fails, so a failed
    /// load always leaves the session empty rather than half-stale.
    pub fn load_type(&mut self, name: &str) -> Result<(), EngineError> {
        self.clear_handles();
        self.class = Some(self.scope.resolve(name)?);
        Ok(())
    }

    /// Build a scope from `locations` and resolve `name` in it, in one
    /// step. The new scope replaces the held one and is reused by later
    /// [`Session::load_type`] calls.
    pub fn load_type_from<S: AsRef<str>>(
        &mut self,
        name: &str,
        locations: &[S],
    ) -> Result<(), EngineError> {
        self.clear_handles();
        self.scope = Scope::from_locations(None, locations)?;
        self.class = Some(self.scope.resolve(name)?);
        Ok(())
    }

    /// Bind the constructor of the loaded type with exactly this parameter
    /// signature. Not needed when the method to invoke is static.
    pub fn load_constructor(&mut self, params: &[TypeTag]) -> Result<(), EngineError> {
        let class = self
            .class
            .as_ref()
            .ok_or(EngineError::InvalidState("no type loaded"))?;

        let ctor = class.def().find_constructor(params).ok_or_else(|| {
            EngineError::NoSuchMember {
                type_name: class.name().to_string(),
                kind: MemberKind::Constructor,
                signature: display_signature(params),
            }
        })?;

        self.constructor = Some(ctor);
        Ok(())
    }

    /// Invoke the bound constructor and store the produced instance as the
    /// receiver for subsequent non-static invocations.
    pub fn load_instance(&mut self, args: &[Value]) -> Result<(), EngineError> {
        let ctor = self
            .constructor
            .as_ref()
            .ok_or(EngineError::InvalidState("no constructor loaded"))?;

        check_arguments(ctor.params(), args)?;
        let instance = run_call(|| ctor.call(args))?;
        self.instance = Some(instance);
        Ok(())
    }

    /// Bind the method of the loaded type with exactly this name and
    /// parameter signature. Requires a loaded type, but no constructor or
    /// instance — a static method can be bound and invoked directly.
    pub fn load_method(&mut self, name: &str, params: &[TypeTag]) -> Result<(), EngineError> {
        let class = self
            .class
            .as_ref()
            .ok_or(EngineError::InvalidState("no type loaded"))?;

        let method = class.def().find_method(name, params).ok_or_else(|| {
            EngineError::NoSuchMember {
                type_name: class.name().to_string(),
                kind: MemberKind::Method,
                signature: format!("{}{}", name, display_signature(params)),
            }
        })?;

        self.method = Some(method);
        Ok(())
    }

    /// Invoke the bound method. The held instance, if any, is the
    /// receiver; a static method runs without one.
    ///
    /// Every failure path returns an error and leaves the held handles
    /// untouched, so the session can retry or pivot afterwards. A
    /// non-static method with no instance loaded reports an invocation
    /// error rather than calling into the module.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, EngineError> {
        let method = self
            .method
            .as_ref()
            .ok_or(EngineError::InvalidState("no method loaded"))?;

        if !method.is_static() && self.instance.is_none() {
            return Err(EngineError::Invocation(format!(
                "method `{}` is not static and no instance is loaded",
                method.name()
            )));
        }

        check_arguments(method.params(), args)?;
        run_call(|| method.call(self.instance.as_ref(), args))
    }

    /// The furthest stage currently bound.
    pub fn state(&self) -> SessionState {
        if self.method.is_some() {
            SessionState::MethodLoaded
        } else if self.instance.is_some() {
            SessionState::InstanceReady
        } else if self.constructor.is_some() {
            SessionState::ConstructorLoaded
        } else if self.class.is_some() {
            SessionState::TypeLoaded
        } else {
            SessionState::Empty
        }
    }

    /// The scope the session currently resolves against.
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// The loaded type, if any.
    pub fn class(&self) -> Option<&TypeHandle> {
        self.class.as_ref()
    }

    /// The bound constructor, if any.
    pub fn constructor(&self) -> Option<&Arc<ConstructorDef>> {
        self.constructor.as_ref()
    }

    /// The constructed instance, if any. `None` is the normal state for
    /// static call chains.
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    fn clear_handles(&mut self) {
        self.class = None;
        self.constructor = None;
        self.instance = None;
        self.method = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

fn check_arguments(params: &[TypeTag], args: &[Value]) -> Result<(), EngineError> {
    if params.len() != args.len() {
        return Err(EngineError::Invocation(format!(
            "expected {} argument(s), got {}",
            params.len(),
            args.len()
        )));
    }
    for (i, (tag, value)) in params.iter().zip(args).enumerate() {
        if !value.binds_to(*tag) {
            return Err(EngineError::Invocation(format!(
                "argument {} does not bind to `{}`: got {}",
                i,
                tag,
                value.type_name()
            )));
        }
    }
    Ok(())
}

/// Run a module call, converting both reported errors and panics into
/// invocation errors so a misbehaving module cannot take the session down.
fn run_call<T>(f: impl FnOnce() -> CallResult<T>) -> Result<T, EngineError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(EngineError::Invocation(err.to_string())),
        Err(payload) => Err(EngineError::Invocation(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("call panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("call panicked: {}", s)
    } else {
        "call panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use mirra_sdk::{CallError, ModuleDef, TypeDef};

    use super::*;

    struct Calculator {
        base: i32,
    }

    fn calc_ctor(_args: &[Value]) -> CallResult<Instance> {
        Ok(Instance::new("demo.Calculator", Calculator { base: 0 }))
    }

    fn calc_ctor_base(args: &[Value]) -> CallResult<Instance> {
        let base = args[0].as_i32().ok_or("expected i32 base")?;
        Ok(Instance::new("demo.Calculator", Calculator { base }))
    }

    fn calc_add(recv: Option<&Instance>, args: &[Value]) -> CallResult<Value> {
        let calc = recv
            .and_then(|r| r.downcast_ref::<Calculator>())
            .ok_or("receiver is not a Calculator")?;
        let a = args[0].as_i32().ok_or("expected i32")?;
        let b = args[1].as_i32().ok_or("expected i32")?;
        Ok(Value::I32(calc.base + a + b))
    }

    fn calc_sum(_recv: Option<&Instance>, args: &[Value]) -> CallResult<Value> {
        let a = args[0].as_i32().ok_or("expected i32")?;
        let b = args[1].as_i32().ok_or("expected i32")?;
        Ok(Value::I32(a + b))
    }

    fn calc_fail(_recv: Option<&Instance>, _args: &[Value]) -> CallResult<Value> {
        Err(CallError::Failed("deliberate failure".to_string()))
    }

    fn calc_panic(_recv: Option<&Instance>, _args: &[Value]) -> CallResult<Value> {
        panic!("boom");
    }

    struct Counter {
        count: AtomicI64,
    }

    fn counter_ctor(_args: &[Value]) -> CallResult<Instance> {
        Ok(Instance::new(
            "demo.Counter",
            Counter {
                count: AtomicI64::new(0),
            },
        ))
    }

    fn counter_next(recv: Option<&Instance>, _args: &[Value]) -> CallResult<Value> {
        let counter = recv
            .and_then(|r| r.downcast_ref::<Counter>())
            .ok_or("receiver is not a Counter")?;
        Ok(Value::I64(counter.count.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn counter_peek(recv: Option<&Instance>, _args: &[Value]) -> CallResult<Value> {
        let counter = recv
            .and_then(|r| r.downcast_ref::<Counter>())
            .ok_or("receiver is not a Counter")?;
        Ok(Value::I64(counter.count.load(Ordering::SeqCst)))
    }

    fn test_scope() -> Arc<Scope> {
        let mut module = ModuleDef::new("demo", "0.0.0");

        let mut calc = TypeDef::new("demo.Calculator");
        calc.register_constructor(&[], calc_ctor);
        calc.register_constructor(&[TypeTag::I32], calc_ctor_base);
        calc.register_method("add", &[TypeTag::I32, TypeTag::I32], calc_add);
        calc.register_method("fail", &[], calc_fail);
        calc.register_method("panic", &[], calc_panic);
        calc.register_static_method("sum", &[TypeTag::I32, TypeTag::I32], calc_sum);
        module.register_type(calc);

        let mut counter = TypeDef::new("demo.Counter");
        counter.register_constructor(&[], counter_ctor);
        counter.register_method("next", &[], counter_next);
        counter.register_method("peek", &[], counter_peek);
        module.register_type(counter);

        Scope::from_modules(None, [module])
    }

    fn loaded_session() -> Session {
        let mut session = Session::with_scope(test_scope());
        session.load_type("demo.Calculator").unwrap();
        session
    }

    #[test]
    fn test_loads_before_type_are_invalid_state() {
        let mut session = Session::with_scope(test_scope());

        assert!(matches!(
            session.load_constructor(&[]),
            Err(EngineError::InvalidState(_))
        ));
        assert!(matches!(
            session.load_method("add", &[]),
            Err(EngineError::InvalidState(_))
        ));
        assert!(matches!(
            session.load_instance(&[]),
            Err(EngineError::InvalidState(_))
        ));
        assert!(matches!(
            session.invoke(&[]),
            Err(EngineError::InvalidState(_))
        ));

        assert!(session.class().is_none());
        assert!(session.constructor().is_none());
        assert!(session.instance().is_none());
    }

    #[test]
    fn test_full_chain_round_trip() {
        let mut session = Session::with_scope(test_scope());
        assert_eq!(session.state(), SessionState::Empty);

        session.load_type("demo.Calculator").unwrap();
        assert_eq!(session.state(), SessionState::TypeLoaded);

        session.load_constructor(&[]).unwrap();
        assert_eq!(session.state(), SessionState::ConstructorLoaded);

        session.load_instance(&[]).unwrap();
        assert_eq!(session.state(), SessionState::InstanceReady);

        session
            .load_method("add", &[TypeTag::I32, TypeTag::I32])
            .unwrap();
        assert_eq!(session.state(), SessionState::MethodLoaded);

        let result = session.invoke(&[Value::I32(2), Value::I32(3)]).unwrap();
        assert_eq!(result, Value::I32(5));
    }

    #[test]
    fn test_constructor_arguments_reach_the_instance() {
        let mut session = loaded_session();
        session.load_constructor(&[TypeTag::I32]).unwrap();
        session.load_instance(&[Value::I32(100)]).unwrap();
        session
            .load_method("add", &[TypeTag::I32, TypeTag::I32])
            .unwrap();

        let result = session.invoke(&[Value::I32(2), Value::I32(3)]).unwrap();
        assert_eq!(result, Value::I32(105));
    }

    #[test]
    fn test_static_method_needs_no_instance() {
        let mut session = loaded_session();
        session
            .load_method("sum", &[TypeTag::I32, TypeTag::I32])
            .unwrap();

        let result = session.invoke(&[Value::I32(20), Value::I32(22)]).unwrap();
        assert_eq!(result, Value::I32(42));
        assert!(session.constructor().is_none());
        assert!(session.instance().is_none());
    }

    #[test]
    fn test_non_static_without_instance_is_invocation_error() {
        let mut session = loaded_session();
        session
            .load_method("add", &[TypeTag::I32, TypeTag::I32])
            .unwrap();

        let result = session.invoke(&[Value::I32(1), Value::I32(2)]);
        assert!(matches!(result, Err(EngineError::Invocation(_))));

        // The session is still usable: load an instance and retry.
        session.load_constructor(&[]).unwrap();
        session.load_instance(&[]).unwrap();
        let result = session.invoke(&[Value::I32(1), Value::I32(2)]).unwrap();
        assert_eq!(result, Value::I32(3));
    }

    #[test]
    fn test_exact_signature_match_only() {
        let mut session = loaded_session();

        assert!(matches!(
            session.load_method("add", &[TypeTag::I64, TypeTag::I64]),
            Err(EngineError::NoSuchMember { .. })
        ));
        assert!(matches!(
            session.load_method("add", &[TypeTag::I32]),
            Err(EngineError::NoSuchMember { .. })
        ));
        assert!(matches!(
            session.load_constructor(&[TypeTag::I64]),
            Err(EngineError::NoSuchMember { .. })
        ));
    }

    #[test]
    fn test_failed_member_load_keeps_previous_binding() {
        let mut session = loaded_session();
        session
            .load_method("add", &[TypeTag::I32, TypeTag::I32])
            .unwrap();
        session.load_constructor(&[]).unwrap();
        session.load_instance(&[]).unwrap();

        // A miss must not disturb the bindings already held.
        assert!(session.load_method("missing", &[]).is_err());
        assert!(session.load_constructor(&[TypeTag::Str]).is_err());

        let result = session.invoke(&[Value::I32(2), Value::I32(3)]).unwrap();
        assert_eq!(result, Value::I32(5));
    }

    #[test]
    fn test_load_type_clears_downstream_handles() {
        let mut session = loaded_session();
        session.load_constructor(&[]).unwrap();
        session.load_instance(&[]).unwrap();
        session
            .load_method("add", &[TypeTag::I32, TypeTag::I32])
            .unwrap();

        // Re-loading even the same name resets the whole chain.
        session.load_type("demo.Calculator").unwrap();
        assert!(session.constructor().is_none());
        assert!(session.instance().is_none());
        assert!(matches!(
            session.invoke(&[Value::I32(1), Value::I32(2)]),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_failed_load_type_also_clears() {
        let mut session = loaded_session();
        session.load_constructor(&[]).unwrap();
        session.load_instance(&[]).unwrap();

        assert!(matches!(
            session.load_type("demo.DoesNotExist"),
            Err(EngineError::TypeNotFound { .. })
        ));
        assert!(session.class().is_none());
        assert!(session.constructor().is_none());
        assert!(session.instance().is_none());
    }

    #[test]
    fn test_method_pivot_reuses_instance() {
        let mut session = Session::with_scope(test_scope());
        session.load_type("demo.Counter").unwrap();
        session.load_constructor(&[]).unwrap();
        session.load_instance(&[]).unwrap();

        session.load_method("next", &[]).unwrap();
        assert_eq!(session.invoke(&[]).unwrap(), Value::I64(1));
        assert_eq!(session.invoke(&[]).unwrap(), Value::I64(2));

        session.load_method("peek", &[]).unwrap();
        assert_eq!(session.invoke(&[]).unwrap(), Value::I64(2));
    }

    #[test]
    fn test_failing_call_leaves_session_usable() {
        let mut session = loaded_session();
        session.load_constructor(&[]).unwrap();
        session.load_instance(&[]).unwrap();

        session.load_method("fail", &[]).unwrap();
        let result = session.invoke(&[]);
        assert!(matches!(result, Err(EngineError::Invocation(_))));

        session
            .load_method("add", &[TypeTag::I32, TypeTag::I32])
            .unwrap();
        assert_eq!(
            session.invoke(&[Value::I32(2), Value::I32(2)]).unwrap(),
            Value::I32(4)
        );
    }

    #[test]
    fn test_panicking_call_becomes_invocation_error() {
        let mut session = loaded_session();
        session.load_constructor(&[]).unwrap();
        session.load_instance(&[]).unwrap();
        session.load_method("panic", &[]).unwrap();

        match session.invoke(&[]) {
            Err(EngineError::Invocation(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected invocation error, got {:?}", other),
        }
    }

    #[test]
    fn test_argument_mismatch_is_invocation_error() {
        let mut session = loaded_session();
        session
            .load_method("sum", &[TypeTag::I32, TypeTag::I32])
            .unwrap();

        // Wrong arity
        assert!(matches!(
            session.invoke(&[Value::I32(1)]),
            Err(EngineError::Invocation(_))
        ));
        // Wrong tag: i64 does not bind to an i32 slot
        assert!(matches!(
            session.invoke(&[Value::I64(1), Value::I32(2)]),
            Err(EngineError::Invocation(_))
        ));
    }
}
