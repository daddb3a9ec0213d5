//! Session-oriented tool invocation over an event stream
//!
//! A server exposes named, schema-described tools behind two HTTP routes:
//! a long-lived event stream that announces a session and carries
//! responses, and a message-submission endpoint scoped by the session id.
//! The client negotiates the session out of the stream, correlates calls
//! to response frames by id, and decodes result content.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::SseClient;
pub use config::Config;
pub use error::{Result, SimpleMcpError};
