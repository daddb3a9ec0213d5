//! Server side: tool registry, request dispatch, and the SSE transport

pub mod dispatch;
pub mod http;
pub mod registry;
pub mod tools;

pub use dispatch::Dispatcher;
pub use http::{router, serve, AppState};
pub use registry::{ParamSpec, ParamType, ToolDescriptor, ToolHandler, ToolRegistry};
