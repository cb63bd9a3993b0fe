//! Message Server
//!
//! Accepts WebSocket connections, walks each through the
//! Unauthenticated → Authenticated → Closed state machine, and dispatches
//! envelopes. Response-marker envelopes resolve pending handles directly;
//! everything else lands on one strict FIFO drained by a single worker, so
//! exactly one handler runs at a time, including any nested round trip it
//! performs (deliberate head-of-line blocking).

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use super::handlers;
use super::protocol::{self, Request, RequestType, Response, ResponseType, AUTH_ACK};
use super::state::BackState;

/// One queued inbound envelope, tagged with the connection it came from.
pub struct QueuedRequest {
    pub connection: u64,
    pub request: Request,
}

/// Run the message server on an already-bound listener. Never returns under
/// normal operation; the owning process ends it by dropping the future on
/// shutdown.
pub async fn run_message_server(state: Arc<BackState>, listener: TcpListener) -> anyhow::Result<()> {
    // Announce committed view searches to every authenticated client.
    {
        let connections = Arc::clone(&state.connections);
        state.views.set_commit_hook(Arc::new(move |view, total, generation| {
            connections.broadcast(&Response {
                id: String::new(),
                kind: ResponseType::ViewGamesUpdate,
                data: json!({ "view": view, "total": total, "generation": generation }),
            });
        }));
    }

    let (work_tx, work_rx) = mpsc::unbounded_channel::<QueuedRequest>();
    tokio::spawn(dispatch_worker(Arc::clone(&state), work_rx));

    loop {
        match listener.accept().await {
            Ok((stream, address)) => {
                tokio::spawn(handle_connection(
                    Arc::clone(&state),
                    work_tx.clone(),
                    stream,
                ));
                info!("Connection accepted from {address}");
            }
            Err(error) => warn!("Failed to accept connection: {error}"),
        }
    }
}

/// The single FIFO worker. The next request is not dequeued until the
/// current handler (nested round trips included) has fully completed.
async fn dispatch_worker(state: Arc<BackState>, mut work_rx: mpsc::UnboundedReceiver<QueuedRequest>) {
    while let Some(item) = work_rx.recv().await {
        if let Err(failure) = handlers::handle_request(&state, item.connection, item.request).await {
            // A failed handler is reported and the worker moves on.
            push_log(&state, "Backend", format!("Request handler failed: {failure:#}"));
        }
    }
}

async fn handle_connection(
    state: Arc<BackState>,
    work_tx: mpsc::UnboundedSender<QueuedRequest>,
    stream: TcpStream,
) {
    let websocket = match accept_async(stream).await {
        Ok(websocket) => websocket,
        Err(error) => {
            warn!("WebSocket handshake failed: {error}");
            return;
        }
    };
    let (mut write, mut read) = websocket.split();

    // Unauthenticated: the first message must be the shared secret. Anything
    // else closes the connection without a reply.
    match read.next().await {
        Some(Ok(Message::Text(text))) if text == state.secret => {
            if write.send(Message::Text(AUTH_ACK.to_string())).await.is_err() {
                return;
            }
        }
        _ => {
            let _ = write.close().await;
            return;
        }
    }

    // Authenticated: register for broadcasts and start the writer task.
    let (sender, mut outbox) = mpsc::unbounded_channel::<Message>();
    let connection = state.connections.register(sender);
    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            if write.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = read.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(failure) => {
                    error!("Dropping non-UTF-8 message: {failure}");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(error) => {
                warn!("Connection error: {error}");
                break;
            }
        };
        match protocol::parse_request(&text) {
            // Responses resolve immediately; queuing them would deadlock a
            // handler waiting on its own nested request.
            Ok(request) if request.kind == RequestType::GenericResponse => {
                let id = request.id.clone();
                if !state.pending.complete(&id, request) {
                    warn!("Response {id} has no pending request");
                }
            }
            Ok(request) => {
                if work_tx
                    .send(QueuedRequest { connection, request })
                    .is_err()
                {
                    break;
                }
            }
            Err(failure) => {
                error!("Failed to parse incoming request, dropping it: {failure}");
            }
        }
    }

    // Closed: unregister and drop outstanding correlation handles so no
    // pending request outlives its connection.
    state.connections.remove(connection);
    state.pending.drop_connection(connection);
    drop(work_tx);
    let _ = writer.await;
}

/// Send a response envelope to one connection.
pub fn respond(state: &BackState, connection: u64, id: &str, kind: ResponseType, data: Value) {
    let sent = state.connections.send_to(
        connection,
        &Response {
            id: id.to_string(),
            kind,
            data,
        },
    );
    if !sent {
        warn!("Dropped response to closed connection {connection}");
    }
}

/// Append a log entry and broadcast the addition.
pub fn push_log(state: &BackState, source: impl Into<String>, content: impl Into<String>) {
    let (entry, index) = state.append_log(source, content);
    state.connections.broadcast(&Response {
        id: String::new(),
        kind: ResponseType::LogEntryAdded,
        data: json!({ "entry": entry, "index": index }),
    });
}

/// Broadcast a playlist change and drop query caches built on it.
pub fn announce_playlist(state: &BackState, playlist: &crate::game::GamePlaylist) {
    state.invalidate_playlist_queries(&playlist.filename);
    state.connections.broadcast(&Response {
        id: String::new(),
        kind: ResponseType::PlaylistUpdate,
        data: serde_json::to_value(playlist).unwrap_or(Value::Null),
    });
}

/// Send a backend-originated request to a client and await its response
/// envelope. The handler calling this blocks the FIFO worker until the
/// answer arrives through the pending map or the connection closes.
pub async fn request_client(
    state: &BackState,
    connection: u64,
    kind: ResponseType,
    data: Value,
) -> anyhow::Result<Request> {
    let id = Uuid::new_v4().to_string();
    let receiver = state.pending.register(connection, id.clone());
    let sent = state.connections.send_to(
        connection,
        &Response {
            id: id.clone(),
            kind,
            data,
        },
    );
    if !sent {
        state.pending.discard(&id);
        anyhow::bail!("connection {connection} is gone");
    }
    receiver
        .await
        .map_err(|_| anyhow::anyhow!("connection closed before responding"))
}
