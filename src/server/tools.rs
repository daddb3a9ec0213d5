//! Builtin demo tools
//!
//! The toy tools the server binary registers at startup. From the protocol
//! core's point of view these are arbitrary handlers; they double as the
//! fixtures the integration tests call.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::server::registry::{ParamType, ToolDescriptor, ToolRegistry};

/// Register the demo tools into a registry
pub fn register_builtins(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(
        ToolDescriptor::new("hello_world", "A simple hello world tool").optional(
            "name",
            ParamType::String,
            json!("World"),
        ),
        Box::new(hello_world),
    )?;

    registry.register(
        ToolDescriptor::new("add", "Add two numbers")
            .required("a", ParamType::Integer)
            .required("b", ParamType::Integer),
        Box::new(add),
    )?;

    Ok(())
}

/// Fresh registry holding only the demo tools
pub fn builtin_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}

fn hello_world(args: Value) -> anyhow::Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        name: String,
    }

    let args: Args = serde_json::from_value(args)?;
    Ok(json!({ "message": format!("Hello, {}!", args.name) }))
}

fn add(args: Value) -> anyhow::Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        a: i64,
        b: i64,
    }

    let args: Args = serde_json::from_value(args)?;
    Ok(json!(args.a + args.b))
}
