//! Tool registry: name → descriptor + handler
//!
//! Pure data and lookup, no I/O. Registration happens before the server
//! starts accepting calls; afterwards the registry is shared behind an
//! `Arc` and only read, so concurrent lookups need no locking.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::error::RegistryError;
use crate::protocol::Tool;

/// A registered tool's callable
///
/// Handlers are synchronous: they receive validated, typed arguments as a
/// JSON object and return a value or fail. They know nothing about the
/// transport.
pub type ToolHandler = Box<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Parameter type accepted by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// JSON Schema type name
    pub fn json_name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    /// Whether a JSON value inhabits this type
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }

    /// Human-readable name of a value's actual type, for error messages
    pub fn name_of(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// One parameter in a tool's input schema
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
}

/// Immutable description of a registered tool
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Parameters in declaration order
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Add a required parameter
    pub fn required(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            required: true,
            default: None,
        });
        self
    }

    /// Add an optional parameter with a default
    pub fn optional(mut self, name: impl Into<String>, ty: ParamType, default: Value) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            required: false,
            default: Some(default),
        });
        self
    }

    /// Render the input schema as JSON Schema
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut prop = serde_json::Map::new();
            prop.insert("type".to_string(), json!(param.ty.json_name()));
            if let Some(default) = &param.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(json!(param.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Wire form for `tools/list`
    pub fn to_wire(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema(),
        }
    }
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

/// The registry itself
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; fails if the name is already taken
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: ToolHandler,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool {
                name: descriptor.name.clone(),
            });
        }
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool { descriptor, handler });
        Ok(())
    }

    /// Look up a tool's descriptor and handler by name
    pub fn lookup(&self, name: &str) -> Result<(&ToolDescriptor, &ToolHandler), RegistryError> {
        self.index
            .get(name)
            .map(|&i| {
                let tool = &self.tools[i];
                (&tool.descriptor, &tool.handler)
            })
            .ok_or_else(|| RegistryError::ToolNotFound {
                name: name.to_string(),
            })
    }

    /// Iterate over descriptors in registration order
    pub fn list(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().map(|t| &t.descriptor)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_handler() -> ToolHandler {
        Box::new(|args| Ok(args))
    }

    #[test]
    fn test_register_then_lookup() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("echo", "Echo arguments"), echo_handler())
            .unwrap();

        let (descriptor, handler) = registry.lookup("echo").unwrap();
        assert_eq!(descriptor.name, "echo");
        let out = handler(json!({"x": 1})).unwrap();
        assert_eq!(out, json!({"x": 1}));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("echo", "first"), echo_handler())
            .unwrap();
        let err = registry
            .register(ToolDescriptor::new("echo", "second"), echo_handler())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool { name } if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.lookup("missing_tool").err().unwrap();
        assert!(matches!(err, RegistryError::ToolNotFound { name } if name == "missing_tool"));
    }

    #[test]
    fn test_list_preserves_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["c", "a", "b"] {
            registry
                .register(ToolDescriptor::new(name, ""), echo_handler())
                .unwrap();
        }
        let names: Vec<&str> = registry.list().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);

        // restartable
        let again: Vec<&str> = registry.list().map(|d| d.name.as_str()).collect();
        assert_eq!(again, names);
    }

    #[test]
    fn test_input_schema_shape() {
        let descriptor = ToolDescriptor::new("add", "Add two numbers")
            .required("a", ParamType::Integer)
            .required("b", ParamType::Integer);
        let schema = descriptor.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "integer");
        assert_eq!(schema["required"], json!(["a", "b"]));
    }

    #[test]
    fn test_optional_param_default_in_schema() {
        let descriptor = ToolDescriptor::new("hello_world", "Greet").optional(
            "name",
            ParamType::String,
            json!("World"),
        );
        let schema = descriptor.input_schema();
        assert_eq!(schema["properties"]["name"]["default"], "World");
        assert_eq!(schema["required"], json!([]));
    }
}
