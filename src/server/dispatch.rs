//! Request dispatch
//!
//! Decodes an incoming JSON-RPC message, routes it by method, validates
//! tool-call arguments against the registered schema, and invokes the
//! handler. Every failure is recovered into an error response; nothing a
//! handler does can take down the session.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ValidationError;
use crate::protocol::{
    methods, CallToolParams, CallToolResult, Content, IncomingMessage, InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    RequestId, ServerInfo, PROTOCOL_VERSION,
};
use crate::server::registry::{ToolDescriptor, ToolRegistry};

/// Dispatches decoded requests against a read-only registry
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    server_info: ServerInfo,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, name: &str, version: &str) -> Self {
        Self {
            registry,
            server_info: ServerInfo {
                name: name.to_string(),
                version: version.to_string(),
            },
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Handle a message: requests get a response, notifications do not
    pub fn handle_message(&self, message: IncomingMessage) -> Option<JsonRpcResponse> {
        match message {
            IncomingMessage::Request(request) => Some(self.handle_request(request)),
            IncomingMessage::Notification(notification) => {
                self.handle_notification(notification);
                None
            }
        }
    }

    /// Handle a single request
    pub fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request.id),
            methods::PING => JsonRpcResponse::success(request.id, json!({})),
            methods::LIST_TOOLS => self.handle_list_tools(request.id),
            methods::CALL_TOOL => self.handle_call_tool(request.id, request.params),
            other => JsonRpcResponse::error(request.id, JsonRpcError::method_not_found(other)),
        }
    }

    fn handle_notification(&self, notification: JsonRpcNotification) {
        if notification.method == methods::INITIALIZED {
            debug!("client completed initialize handshake");
        } else {
            debug!(method = %notification.method, "ignoring notification");
        }
    }

    fn handle_initialize(&self, id: RequestId) -> JsonRpcResponse {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: self.server_info.clone(),
            capabilities: json!({ "tools": {} }),
        };
        success(id, &result)
    }

    fn handle_list_tools(&self, id: RequestId) -> JsonRpcResponse {
        let result = ListToolsResult {
            tools: self.registry.list().map(ToolDescriptor::to_wire).collect(),
        };
        success(id, &result)
    }

    fn handle_call_tool(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, JsonRpcError::invalid_params("missing params"));
        };
        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("invalid tool parameters: {}", e)),
                );
            }
        };

        let (descriptor, handler) = match self.registry.lookup(&params.name) {
            Ok(found) => found,
            Err(e) => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params(e.to_string()));
            }
        };

        let arguments = match validate_arguments(descriptor, params.arguments) {
            Ok(validated) => validated,
            Err(e) => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params(e.to_string()));
            }
        };

        match handler(arguments) {
            Ok(value) => success(
                id,
                &CallToolResult {
                    content: value_to_content(value),
                    is_error: false,
                },
            ),
            Err(e) => {
                debug!(tool = %params.name, error = %e, "handler failed");
                JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string()))
            }
        }
    }
}

/// Check provided arguments against a descriptor's schema
///
/// Returns the validated argument object with declared defaults injected.
/// Unknown parameters are rejected rather than ignored.
pub fn validate_arguments(
    descriptor: &ToolDescriptor,
    arguments: Value,
) -> Result<Value, ValidationError> {
    let mut map = match arguments {
        Value::Null => serde_json::Map::new(),
        Value::Object(map) => map,
        _ => return Err(ValidationError::NotAnObject),
    };

    for key in map.keys() {
        if !descriptor.params.iter().any(|p| &p.name == key) {
            return Err(ValidationError::UnknownParameter { name: key.clone() });
        }
    }

    for param in &descriptor.params {
        match map.get(&param.name) {
            Some(value) => {
                if !param.ty.matches(value) {
                    return Err(ValidationError::TypeMismatch {
                        name: param.name.clone(),
                        expected: param.ty.json_name().to_string(),
                        actual: crate::server::registry::ParamType::name_of(value).to_string(),
                    });
                }
            }
            None => {
                if let Some(default) = &param.default {
                    map.insert(param.name.clone(), default.clone());
                } else if param.required {
                    return Err(ValidationError::MissingParameter {
                        name: param.name.clone(),
                    });
                }
            }
        }
    }

    Ok(Value::Object(map))
}

/// Serialize a handler's return value into result content
///
/// Strings are framed as raw text; everything else becomes compact JSON in
/// a single text item.
fn value_to_content(value: Value) -> Vec<Content> {
    match value {
        Value::String(text) => vec![Content::text(text)],
        other => vec![Content::text(other.to_string())],
    }
}

fn success<T: Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
    }
}
