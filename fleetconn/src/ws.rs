//! The push-client WebSocket endpoint
//!
//! Each connection runs two cooperative loops: a reader that handles
//! control frames and enforces the pong-wait read deadline, and a writer
//! that drains the client's outbound queue and keeps the transport alive
//! with periodic pings. The hub closing the queue ends the writer with a
//! close frame.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use fleetconn_core::hub::{Envelope, Hub, InboundMessage};

use crate::state::AppState;

/// Deadline for every outbound transport write
const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4().to_string();
    let outbound = state.hub.register(client_id.clone()).await;

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_pump(sink, outbound, state.config.ws_ping_interval));

    read_pump(stream, &state.hub, &client_id, state.config.ws_pong_wait).await;

    // Reader is done; closing the queue lets the writer finish with a
    // close frame.
    state.hub.unregister(&client_id).await;
    let _ = writer.await;
}

/// Receives control frames until a read error or deadline expiry
///
/// The read deadline extends only when the peer answers a transport ping
/// with a pong; application traffic does not count as liveness.
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    hub: &Hub,
    client_id: &str,
    pong_wait: Duration,
) {
    let mut deadline = tokio::time::Instant::now() + pong_wait;

    loop {
        let message = match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                tracing::debug!(client_id, %e, "WebSocket read error");
                break;
            }
            // Stream ended or the peer went silent past the deadline
            Ok(None) | Err(_) => break,
        };

        match message {
            Message::Text(text) => handle_inbound(hub, client_id, text.as_str()).await,
            Message::Pong(_) => {
                deadline = tokio::time::Instant::now() + pong_wait;
            }
            Message::Ping(_) | Message::Binary(_) => {}
            Message::Close(_) => break,
        }
    }
}

/// Decodes one inbound envelope and applies its control action
async fn handle_inbound(hub: &Hub, client_id: &str, text: &str) {
    let Ok(message) = serde_json::from_str::<InboundMessage>(text) else {
        hub.send_to(client_id, &Envelope::error("Invalid message format"))
            .await;
        return;
    };

    match message.kind.as_str() {
        "subscribe" if message.server_id > 0 => {
            hub.subscribe(client_id, message.server_id).await;
            hub.send_to(client_id, &Envelope::ack("subscribed", message.server_id))
                .await;
        }
        "ping" => {
            hub.send_to(client_id, &Envelope::pong()).await;
        }
        _ => {}
    }
}

/// Drains the outbound queue and pings the transport between frames
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    ping_interval: Duration,
) {
    let start = tokio::time::Instant::now() + ping_interval;
    let mut ticker = tokio::time::interval_at(start, ping_interval);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(text) => {
                        let write = sink.send(Message::Text(text.into()));
                        match tokio::time::timeout(WRITE_DEADLINE, write).await {
                            Ok(Ok(())) => {}
                            _ => break,
                        }
                    }
                    None => {
                        // Queue closed by the hub; say goodbye properly.
                        let close = sink.send(Message::Close(None));
                        let _ = tokio::time::timeout(WRITE_DEADLINE, close).await;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                let ping = sink.send(Message::Ping(Vec::new().into()));
                match tokio::time::timeout(WRITE_DEADLINE, ping).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }
}
