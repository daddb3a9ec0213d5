//! Client side of the event stream
//!
//! Opens the streaming GET, scans frames for the session announcement,
//! then keeps pumping response frames into the pending-call table for the
//! life of the connection. A malformed frame is fatal during negotiation
//! and skipped with a warning afterwards.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::correlator::PendingCalls;
use crate::client::session::{Session, SessionHandle};
use crate::error::{CallError, SessionError, TransportError};
use crate::protocol::{Frame, FrameBuffer, JsonRpcResponse};

type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>;

/// Open the event stream and negotiate a session
///
/// On success the session handle is `Established` and a background task
/// owns the rest of the stream. If the stream closes or errors before the
/// announcement, the handle is closed and the caller sees
/// `SessionError::NotEstablished`.
pub(crate) async fn connect_stream(
    http: &reqwest::Client,
    sse_url: &Url,
    session_handle: Arc<SessionHandle>,
    pending: Arc<PendingCalls>,
) -> Result<Session, CallError> {
    let response = http
        .get(sse_url.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| {
            session_handle.close();
            CallError::Transport(TransportError::Http(e))
        })?;

    if !response.status().is_success() {
        session_handle.close();
        return Err(CallError::Transport(TransportError::UnexpectedStatus {
            status: response.status().as_u16(),
        }));
    }

    let mut stream: BodyStream = Box::pin(response.bytes_stream());
    let mut buffer = FrameBuffer::default();

    // Negotiation: read until the announcement frame. Frames decoded from
    // the same chunk after it are carried over to the reader task.
    let mut leftover = Vec::new();
    let mut negotiated = None;

    'scan: while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            session_handle.close();
            CallError::Transport(TransportError::Http(e))
        })?;

        let mut frames = buffer.push(&chunk).into_iter();
        while let Some(frame) = frames.next() {
            if frame.is_endpoint() {
                let session = parse_announcement(sse_url, &frame.data).map_err(|e| {
                    session_handle.close();
                    CallError::Transport(e)
                })?;
                leftover.extend(frames);
                negotiated = Some(session);
                break 'scan;
            }
            debug!(event = ?frame.event, "skipping pre-session frame");
        }
    }

    let Some(session) = negotiated else {
        session_handle.close();
        return Err(CallError::Session(SessionError::NotEstablished));
    };

    session_handle.establish(session.clone());
    info!(session_id = %session.id, "session established");

    tokio::spawn(read_loop(stream, buffer, leftover, session_handle, pending));

    Ok(session)
}

/// Pump the rest of the stream, resolving pending calls
async fn read_loop(
    mut stream: BodyStream,
    mut buffer: FrameBuffer,
    initial: Vec<Frame>,
    session_handle: Arc<SessionHandle>,
    pending: Arc<PendingCalls>,
) {
    for frame in initial {
        handle_frame(frame, &pending);
    }

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                for frame in buffer.push(&chunk) {
                    handle_frame(frame, &pending);
                }
            }
            Err(e) => {
                debug!(error = %e, "event stream read error");
                break;
            }
        }
    }

    for frame in buffer.finish() {
        handle_frame(frame, &pending);
    }

    debug!("event stream ended");
    session_handle.close();
    pending.fail_all();
}

fn handle_frame(frame: Frame, pending: &PendingCalls) {
    // Only the first announcement counts; repeats are ignored.
    if frame.is_endpoint() {
        debug!("ignoring repeated session announcement");
        return;
    }

    match serde_json::from_str::<JsonRpcResponse>(&frame.data) {
        Ok(response) => {
            pending.resolve(response);
        }
        Err(e) => warn!(error = %e, "skipping malformed frame"),
    }
}

/// Extract the session from an announcement payload
///
/// The payload is an endpoint URI (usually relative) carrying the session
/// id as a query parameter.
fn parse_announcement(base: &Url, data: &str) -> Result<Session, TransportError> {
    let endpoint = base
        .join(data)
        .map_err(|_| TransportError::InvalidEndpoint {
            uri: data.to_string(),
        })?;

    let id = endpoint
        .query_pairs()
        .find(|(key, _)| key == "session_id")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| TransportError::MalformedFrame {
            detail: format!("session announcement without session_id: {}", data),
        })?;

    Ok(Session {
        id,
        endpoint,
        established_at: Instant::now(),
    })
}
