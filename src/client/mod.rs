//! Client side: session negotiation, call correlation, content decoding

pub mod correlator;
pub mod decode;
pub mod session;
mod stream;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::error::{CallError, Result, SimpleMcpError, TransportError};
use crate::protocol::{
    methods, CallToolParams, CallToolResult, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, Tool, PROTOCOL_VERSION,
};

pub use correlator::PendingCalls;
pub use decode::decode_content;
pub use session::{Session, SessionHandle};

/// Client name reported during the initialize handshake
const CLIENT_NAME: &str = "simple-mcp";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client for the session-oriented tool-invocation protocol
///
/// Connection is lazy: the first call (or an explicit [`connect`]) opens
/// the event stream, negotiates the session, and runs the initialize
/// handshake. Calls may then be issued concurrently; each carries its own
/// timeout and is matched to its response frame by id.
///
/// [`connect`]: SseClient::connect
pub struct SseClient {
    http: reqwest::Client,
    sse_url: Url,
    session: Arc<SessionHandle>,
    pending: Arc<PendingCalls>,
    connect_gate: Mutex<()>,
    default_timeout: Duration,
}

impl SseClient {
    /// Create a client for the given event-stream URL
    pub fn new(url: &str) -> Result<Self> {
        let sse_url = Url::parse(url).map_err(|_| {
            SimpleMcpError::Transport(TransportError::InvalidEndpoint {
                uri: url.to_string(),
            })
        })?;

        // No client-level timeout: the stream GET is expected to outlive
        // any single request. Per-call deadlines cover the POSTs.
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SimpleMcpError::Transport(TransportError::Http(e)))?;

        Ok(Self {
            http,
            sse_url,
            session: Arc::new(SessionHandle::new()),
            pending: Arc::new(PendingCalls::new()),
            connect_gate: Mutex::new(()),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Override the timeout used for handshake and list operations
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The negotiated session, if one is established
    pub fn session(&self) -> Option<Session> {
        self.session.current().ok()
    }

    /// Ensure the session is established, negotiating if necessary
    ///
    /// Idempotent; concurrent callers share one negotiation. Once the
    /// connection has closed this fails without reconnecting.
    pub async fn connect(&self) -> std::result::Result<(), CallError> {
        let _gate = self.connect_gate.lock().await;

        if self.session.is_established() {
            return Ok(());
        }
        if self.session.is_closed() {
            return Err(CallError::Session(self.session.closed_kind()));
        }

        stream::connect_stream(
            &self.http,
            &self.sse_url,
            self.session.clone(),
            self.pending.clone(),
        )
        .await?;

        // Lifecycle handshake; this also exercises the correlator, so a
        // server that never answers surfaces as a timeout here.
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": { "name": CLIENT_NAME, "version": CLIENT_VERSION },
            "capabilities": {},
        });
        let response = self
            .request(methods::INITIALIZE, Some(params), self.default_timeout)
            .await?;
        let init = expect_result(response)?;
        debug!(server = %init["serverInfo"]["name"], "initialize handshake complete");

        self.notify(methods::INITIALIZED, None).await?;
        Ok(())
    }

    /// List the tools the server exposes
    pub async fn list_tools(&self) -> std::result::Result<Vec<Tool>, CallError> {
        self.connect().await?;
        let response = self
            .request(methods::LIST_TOOLS, None, self.default_timeout)
            .await?;
        let result = expect_result(response)?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| CallError::UnexpectedResponse {
                detail: "missing tools in list result".to_string(),
            })?;
        serde_json::from_value(tools).map_err(|e| CallError::UnexpectedResponse {
            detail: e.to_string(),
        })
    }

    /// Call a tool and return the raw result
    ///
    /// Fails with [`CallError::Timeout`] if no response frame arrives
    /// within `timeout`; the pending entry is removed and a late response
    /// is discarded. The server-side computation is not cancelled.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> std::result::Result<CallToolResult, CallError> {
        self.connect().await?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let params = serde_json::to_value(params).map_err(|e| CallError::UnexpectedResponse {
            detail: e.to_string(),
        })?;

        let response = self.request(methods::CALL_TOOL, Some(params), timeout).await?;
        let result = expect_result(response)?;
        serde_json::from_value(result).map_err(|e| CallError::UnexpectedResponse {
            detail: e.to_string(),
        })
    }

    /// Call a tool and decode its content into a value
    ///
    /// Tool-level failures (the response `error`, or a result flagged
    /// `isError`) surface as [`CallError::Tool`].
    pub async fn call(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> std::result::Result<Value, CallError> {
        let result = self.call_tool(name, arguments, timeout).await?;

        if result.is_error {
            let message = result
                .content
                .iter()
                .filter_map(|item| match item {
                    crate::protocol::Content::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            return Err(CallError::Tool {
                code: -32000,
                message,
            });
        }

        Ok(decode_content(&result.content))
    }

    /// Issue one correlated request and await its response frame
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> std::result::Result<JsonRpcResponse, CallError> {
        let session = self.session.current()?;

        let id = RequestId::String(Uuid::new_v4().to_string());
        let rx = self.pending.register(id.clone());
        let request = JsonRpcRequest::new(id.clone(), method, params);

        let exchange = async {
            let response = self
                .http
                .post(session.endpoint.clone())
                .json(&request)
                .send()
                .await
                .map_err(TransportError::Http)?;

            if !response.status().is_success() {
                return Err(CallError::Transport(TransportError::UnexpectedStatus {
                    status: response.status().as_u16(),
                }));
            }

            match rx.await {
                Ok(response) => Ok(response),
                // Sender dropped: the reader task failed all pending calls.
                Err(_) => Err(CallError::Session(self.session.closed_kind())),
            }
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                self.pending.forget(&id);
                Err(e)
            }
            Err(_) => {
                self.pending.forget(&id);
                Err(CallError::Timeout {
                    tool: method_label(method, &request),
                    timeout,
                })
            }
        }
    }

    /// Send a notification; no response is expected
    async fn notify(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<(), CallError> {
        let session = self.session.current()?;
        let notification = JsonRpcNotification::new(method, params);

        let response = self
            .http
            .post(session.endpoint.clone())
            .json(&notification)
            .send()
            .await
            .map_err(|e| CallError::Transport(TransportError::Http(e)))?;

        if !response.status().is_success() {
            return Err(CallError::Transport(TransportError::UnexpectedStatus {
                status: response.status().as_u16(),
            }));
        }
        Ok(())
    }
}

/// Label a timeout with the tool name for `tools/call`, otherwise the method
fn method_label(method: &str, request: &JsonRpcRequest) -> String {
    if method == methods::CALL_TOOL {
        if let Some(name) = request
            .params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
        {
            return name.to_string();
        }
    }
    method.to_string()
}

/// Split a response into its result, mapping errors to `CallError::Tool`
fn expect_result(response: JsonRpcResponse) -> std::result::Result<Value, CallError> {
    if let Some(error) = response.error {
        return Err(CallError::Tool {
            code: error.code,
            message: error.message,
        });
    }
    response.result.ok_or_else(|| CallError::UnexpectedResponse {
        detail: "response with neither result nor error".to_string(),
    })
}
