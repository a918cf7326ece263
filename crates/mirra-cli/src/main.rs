//! Mirra command-line driver
//!
//! Loads module libraries, resolves types, and invokes members from the
//! command line:
//!
//! ```text
//! mirra call --location file:///opt/mods/libhello.so \
//!     --type hello.Calculator --new \
//!     --method add --arg i32=2 --arg i32=3
//!
//! mirra inspect --location file:///opt/mods/libhello.so
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use mirra_engine::Session;
use mirra_sdk::{display_signature, TypeTag, Value};

#[derive(Parser)]
#[command(name = "mirra")]
#[command(about = "Dynamic module loading and reflective invocation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a type from module locations and invoke one of its methods
    Call {
        /// Module location (file: URL); repeatable, searched in order
        #[arg(long = "location", required = true)]
        locations: Vec<String>,
        /// Fully qualified type name
        #[arg(long = "type")]
        type_name: String,
        /// Method name to invoke
        #[arg(long)]
        method: String,
        /// Method argument as tag=value (e.g. i32=2, str=hi); repeatable,
        /// in order. The method signature is derived from the tags.
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Construct an instance before invoking (for non-static methods)
        #[arg(long)]
        new: bool,
        /// Constructor argument as tag=value; repeatable, implies --new
        #[arg(long = "ctor-arg")]
        ctor_args: Vec<String>,
    },

    /// List the types and members a set of module locations defines
    Inspect {
        /// Module location (file: URL); repeatable
        #[arg(long = "location", required = true)]
        locations: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Call {
            locations,
            type_name,
            method,
            args,
            new,
            ctor_args,
        } => run_call(&locations, &type_name, &method, &args, new, &ctor_args),
        Commands::Inspect { locations } => run_inspect(&locations),
    };

    if let Err(err) = result {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

fn run_call(
    locations: &[String],
    type_name: &str,
    method: &str,
    args: &[String],
    new: bool,
    ctor_args: &[String],
) -> Result<()> {
    let mut session = Session::new();
    session
        .load_type_from(type_name, locations)
        .with_context(|| format!("loading type `{}`", type_name))?;

    if new || !ctor_args.is_empty() {
        let (tags, values) = parse_args(ctor_args)?;
        session
            .load_constructor(&tags)
            .with_context(|| format!("binding constructor {}", display_signature(&tags)))?;
        session
            .load_instance(&values)
            .context("constructing instance")?;
    }

    let (tags, values) = parse_args(args)?;
    session
        .load_method(method, &tags)
        .with_context(|| format!("binding method {}{}", method, display_signature(&tags)))?;

    let result = session
        .invoke(&values)
        .with_context(|| format!("invoking `{}`", method))?;
    println!("{}", result);
    Ok(())
}

fn run_inspect(locations: &[String]) -> Result<()> {
    let mut session = Session::new();
    session.load_scope(locations).context("building scope")?;

    let scope = session.scope().clone();
    let mut names = scope.type_names();
    names.sort();

    for name in names {
        let handle = scope
            .resolve(&name)
            .with_context(|| format!("resolving `{}`", name))?;
        println!("{}", name);
        for ctor in handle.def().constructors() {
            println!("  new{}", display_signature(ctor.params()));
        }
        for m in handle.def().methods() {
            if m.is_static() {
                println!("  static {}", m.display());
            } else {
                println!("  {}", m.display());
            }
        }
    }
    Ok(())
}

/// Parse `tag=value` argument specs into a signature and value list.
fn parse_args(specs: &[String]) -> Result<(Vec<TypeTag>, Vec<Value>)> {
    let mut tags = Vec::with_capacity(specs.len());
    let mut values = Vec::with_capacity(specs.len());
    for spec in specs {
        let (tag, value) = parse_arg(spec)?;
        tags.push(tag);
        values.push(value);
    }
    Ok((tags, values))
}

fn parse_arg(spec: &str) -> Result<(TypeTag, Value)> {
    let Some((tag, raw)) = spec.split_once('=') else {
        bail!("malformed argument `{}`: expected tag=value", spec);
    };
    match tag {
        "bool" => Ok((
            TypeTag::Bool,
            Value::Bool(
                raw.parse()
                    .with_context(|| format!("`{}` is not a bool", raw))?,
            ),
        )),
        "i32" => Ok((
            TypeTag::I32,
            Value::I32(
                raw.parse()
                    .with_context(|| format!("`{}` is not an i32", raw))?,
            ),
        )),
        "i64" => Ok((
            TypeTag::I64,
            Value::I64(
                raw.parse()
                    .with_context(|| format!("`{}` is not an i64", raw))?,
            ),
        )),
        "f64" => Ok((
            TypeTag::F64,
            Value::F64(
                raw.parse()
                    .with_context(|| format!("`{}` is not an f64", raw))?,
            ),
        )),
        "str" => Ok((TypeTag::Str, Value::from(raw))),
        other => bail!(
            "unknown argument tag `{}` (expected bool, i32, i64, f64, or str)",
            other
        ),
    }
}
