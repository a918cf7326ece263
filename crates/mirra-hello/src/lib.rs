//! Demo mirra module: types to be invoked reflectively.
//!
//! Build as a `cdylib` and point the engine at it:
//!
//! ```text
//! mirra call --location file:///path/to/libmirra_hello.so \
//!     --type hello.Greeter --new --method greet --arg str=there
//! ```

use std::sync::atomic::{AtomicI32, Ordering};

use mirra_sdk::{
    declare_module, CallResult, Instance, ModuleDef, TypeDef, TypeTag, Value,
};

// ============================================================================
// hello.Greeter
// ============================================================================

struct Greeter {
    greeted: AtomicI32,
}

fn greeter_ctor(_args: &[Value]) -> CallResult<Instance> {
    Ok(Instance::new(
        "hello.Greeter",
        Greeter {
            greeted: AtomicI32::new(0),
        },
    ))
}

fn greeter_state<'a>(recv: Option<&'a Instance>) -> CallResult<&'a Greeter> {
    recv.and_then(|r| r.downcast_ref::<Greeter>())
        .ok_or_else(|| "receiver is not a Greeter".into())
}

/// `greet()` — the plain greeting.
fn greet(recv: Option<&Instance>, _args: &[Value]) -> CallResult<Value> {
    let greeter = greeter_state(recv)?;
    greeter.greeted.fetch_add(1, Ordering::SeqCst);
    Ok(Value::from("Hello, World!"))
}

/// `greet(str)` — overload with a customized greeting.
fn greet_named(recv: Option<&Instance>, args: &[Value]) -> CallResult<Value> {
    let greeter = greeter_state(recv)?;
    let name = match args[0].as_str() {
        Some(name) => name,
        None => "World",
    };
    greeter.greeted.fetch_add(1, Ordering::SeqCst);
    Ok(Value::Str(format!("Hello, {}!", name)))
}

/// `count()` — how many greetings this instance has produced.
fn greet_count(recv: Option<&Instance>, _args: &[Value]) -> CallResult<Value> {
    let greeter = greeter_state(recv)?;
    Ok(Value::I32(greeter.greeted.load(Ordering::SeqCst)))
}

// ============================================================================
// hello.Calculator
// ============================================================================

struct Calculator {
    base: i32,
}

fn calculator_ctor(_args: &[Value]) -> CallResult<Instance> {
    Ok(Instance::new("hello.Calculator", Calculator { base: 0 }))
}

fn calculator_ctor_base(args: &[Value]) -> CallResult<Instance> {
    let base = args[0].as_i32().ok_or("expected i32 base")?;
    Ok(Instance::new("hello.Calculator", Calculator { base }))
}

/// `add(i32, i32)` — base + a + b.
fn calculator_add(recv: Option<&Instance>, args: &[Value]) -> CallResult<Value> {
    let calc = recv
        .and_then(|r| r.downcast_ref::<Calculator>())
        .ok_or("receiver is not a Calculator")?;
    let a = args[0].as_i32().ok_or("expected i32")?;
    let b = args[1].as_i32().ok_or("expected i32")?;
    Ok(Value::I32(calc.base + a + b))
}

/// `sum(i32, i32)` — static addition, no instance required.
fn calculator_sum(_recv: Option<&Instance>, args: &[Value]) -> CallResult<Value> {
    let a = args[0].as_i32().ok_or("expected i32")?;
    let b = args[1].as_i32().ok_or("expected i32")?;
    Ok(Value::I32(a + b))
}

/// Assemble the module definition. Exported through `mirra_module_init`.
pub fn init() -> ModuleDef {
    let mut module = ModuleDef::new("hello", "0.2.0");

    let mut greeter = TypeDef::new("hello.Greeter");
    greeter.register_constructor(&[], greeter_ctor);
    greeter.register_method("greet", &[], greet);
    greeter.register_method("greet", &[TypeTag::Str], greet_named);
    greeter.register_method("count", &[], greet_count);
    module.register_type(greeter);

    let mut calculator = TypeDef::new("hello.Calculator");
    calculator.register_constructor(&[], calculator_ctor);
    calculator.register_constructor(&[TypeTag::I32], calculator_ctor_base);
    calculator.register_method("add", &[TypeTag::I32, TypeTag::I32], calculator_add);
    calculator.register_static_method("sum", &[TypeTag::I32, TypeTag::I32], calculator_sum);
    module.register_type(calculator);

    module
}

declare_module!(init);
