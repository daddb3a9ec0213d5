//! Integration tests for the tool-invocation protocol
//!
//! Each test spins up a real server on an ephemeral port and drives it
//! with the client over the wire: session negotiation, correlated calls,
//! timeouts, and failure surfaces.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use simple_mcp::client::SseClient;
use simple_mcp::error::{CallError, SessionError};
use simple_mcp::server::{self, AppState, Dispatcher, ParamType, ToolDescriptor, ToolRegistry};

/// Demo registry plus a sleeping tool for timeout tests
fn test_registry() -> ToolRegistry {
    let mut registry = server::tools::builtin_registry().unwrap();
    registry
        .register(
            ToolDescriptor::new("slow_echo", "Sleeps, then echoes a value")
                .required("ms", ParamType::Integer)
                .optional("value", ParamType::String, json!("done")),
            Box::new(|args| {
                let ms = args["ms"].as_u64().unwrap_or(0);
                std::thread::sleep(Duration::from_millis(ms));
                Ok(args["value"].clone())
            }),
        )
        .unwrap();
    registry
}

async fn spawn_server(registry: ToolRegistry) -> SocketAddr {
    let dispatcher = Dispatcher::new(Arc::new(registry), "test-server", "0.0.0");
    let state = AppState::new(dispatcher);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(state)).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> SseClient {
    SseClient::new(&format!("http://{}/sse", addr))
        .unwrap()
        .with_default_timeout(Duration::from_secs(5))
}

mod tool_calls {
    use super::*;

    #[tokio::test]
    async fn add_returns_decoded_sum() {
        let addr = spawn_server(test_registry()).await;
        let client = client_for(addr);

        let result = client
            .call("add", json!({"a": 5, "b": 3}), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(result, json!(8));
    }

    #[tokio::test]
    async fn hello_world_default_and_custom_name() {
        let addr = spawn_server(test_registry()).await;
        let client = client_for(addr);

        let result = client
            .call("hello_world", json!({}), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(result, json!({"message": "Hello, World!"}));

        let result = client
            .call("hello_world", json!({"name": "X"}), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(result, json!({"message": "Hello, X!"}));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_tool_error_naming_it() {
        let addr = spawn_server(test_registry()).await;
        let client = client_for(addr);

        let err = client
            .call("missing_tool", json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            CallError::Tool { message, .. } => assert!(message.contains("missing_tool")),
            other => panic!("expected tool error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_required_parameter_is_rejected() {
        let addr = spawn_server(test_registry()).await;
        let client = client_for(addr);

        let err = client
            .call("add", json!({"a": 5}), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            CallError::Tool { message, .. } => {
                assert!(message.contains("missing required parameter: b"));
            }
            other => panic!("expected tool error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn list_tools_in_registration_order() {
        let addr = spawn_server(server::tools::builtin_registry().unwrap()).await;
        let client = client_for(addr);

        let tools = client.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["hello_world", "add"]);
        assert!(tools[1].input_schema["required"]
            .as_array()
            .unwrap()
            .contains(&json!("a")));
    }
}

mod timeouts {
    use super::*;

    #[tokio::test]
    async fn short_timeout_fails_and_late_response_is_discarded() {
        let addr = spawn_server(test_registry()).await;
        let client = client_for(addr);

        let err = client
            .call(
                "slow_echo",
                json!({"ms": 1000}),
                Duration::from_millis(150),
            )
            .await
            .unwrap_err();
        match err {
            CallError::Timeout { tool, .. } => assert_eq!(tool, "slow_echo"),
            other => panic!("expected timeout, got {:?}", other),
        }

        // The session survives the abandonment and the late response for
        // the timed-out id lands on an empty pending table.
        let result = client
            .call("add", json!({"a": 1, "b": 2}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, json!(3));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let result = client
            .call("add", json!({"a": 2, "b": 2}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, json!(4));
    }

    #[tokio::test]
    async fn concurrent_calls_resolve_out_of_order() {
        let addr = spawn_server(test_registry()).await;
        let client = client_for(addr);

        // The slow call's response arrives after the fast one; matching is
        // by id, not arrival order.
        let (slow, fast) = tokio::join!(
            client.call(
                "slow_echo",
                json!({"ms": 600, "value": "slow"}),
                Duration::from_secs(5),
            ),
            client.call("add", json!({"a": 20, "b": 22}), Duration::from_secs(5)),
        );

        assert_eq!(slow.unwrap(), json!("slow"));
        assert_eq!(fast.unwrap(), json!(42));
    }
}

mod sessions {
    use super::*;

    #[tokio::test]
    async fn one_session_per_connection() {
        let addr = spawn_server(test_registry()).await;
        let client = client_for(addr);

        client.connect().await.unwrap();
        let first = client.session().unwrap();
        assert!(!first.id.is_empty());

        // Further traffic does not renegotiate.
        client
            .call("add", json!({"a": 1, "b": 1}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(client.session().unwrap().id, first.id);

        // A second connection gets its own session.
        let other = client_for(addr);
        other.connect().await.unwrap();
        assert_ne!(other.session().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn stream_closing_before_announcement_fails_calls() {
        // A server that speaks the right content type but closes without
        // ever announcing a session.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 0\r\n\r\n";
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let client = client_for(addr);
        let err = client
            .call("add", json!({"a": 1, "b": 2}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CallError::Session(SessionError::NotEstablished)
        ));

        // Future calls keep failing the same way.
        let err = client
            .call("hello_world", json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CallError::Session(SessionError::NotEstablished)
        ));
    }

    #[tokio::test]
    async fn stream_closing_after_announcement_closes_session() {
        // Announces a session, then drops the stream. The chunked body is
        // terminated properly so the client sees a clean end of stream.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let body = "event: endpoint\ndata: /messages/?session_id=gone\n\n";
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n0\r\n\r\n",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        let client = SseClient::new(&format!("http://{}/sse", addr))
            .unwrap()
            .with_default_timeout(Duration::from_millis(500));

        // The handshake cannot complete on a dead stream; exact failure
        // depends on who notices first, so only the state matters here.
        let _ = client.connect().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let err = client
            .call("add", json!({"a": 1, "b": 2}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Session(SessionError::Closed)));
    }
}
