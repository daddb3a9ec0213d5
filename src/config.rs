//! Configuration for the server and client binaries
//!
//! Everything is environment-driven with defaults matching the reference
//! deployment: the server listens on 127.0.0.1:8000 and the client talks to
//! `http://localhost:8000/sse` with a 10 second call timeout.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ConfigError, Result, SimpleMcpError};

/// Default server port
pub const DEFAULT_PORT: u16 = 8000;

/// Default per-call timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for both halves of the protocol
#[derive(Debug, Clone)]
pub struct Config {
    /// Host the server binds to
    pub host: String,

    /// Port the server binds to
    pub port: u16,

    /// URL of the event-stream endpoint the client connects to
    pub server_url: String,

    /// Default timeout applied to each tool call
    pub call_timeout: Duration,

    /// Log verbosity, fed into the tracing filter
    pub debug_level: String,
}

impl Config {
    /// Build a configuration from the environment
    pub fn new() -> Result<Self> {
        let host =
            std::env::var("SIMPLE_MCP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match std::env::var("SIMPLE_MCP_PORT") {
            Ok(raw) => raw.parse().map_err(|_| {
                SimpleMcpError::Config(ConfigError::InvalidEnvVar {
                    var: "SIMPLE_MCP_PORT".to_string(),
                    value: raw,
                })
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let server_url = std::env::var("SIMPLE_MCP_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/sse", port));

        let timeout_secs = match std::env::var("SIMPLE_MCP_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                SimpleMcpError::Config(ConfigError::InvalidEnvVar {
                    var: "SIMPLE_MCP_TIMEOUT_SECS".to_string(),
                    value: raw,
                })
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let debug_level = std::env::var("DEBUG_LEVEL")
            .unwrap_or_else(|_| "info".to_string())
            .to_lowercase();

        Ok(Self {
            host,
            port,
            server_url,
            call_timeout: Duration::from_secs(timeout_secs),
            debug_level,
        })
    }

    /// Socket address the server binds to
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| {
            SimpleMcpError::Config(ConfigError::InvalidAddress { addr })
        })
    }
}
