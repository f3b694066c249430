//! WebSocket broadcast hub
//!
//! Fans metric snapshots and status changes out to every registered push
//! client. Membership changes flow through register/unregister channels
//! owned by a single dispatch task; frames are enqueued into per-client
//! bounded queues with a non-blocking try-send. Slow consumers lose
//! frames; they never block producers or stall other clients.

mod envelope;

pub use envelope::{Envelope, InboundMessage, MessageType};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::models::{MetricSnapshot, ServerStatus};

/// Per-client outbound queue capacity in frames
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Broadcast channel capacity in frames
pub const BROADCAST_CAPACITY: usize = 256;

/// A registered push recipient as tracked by the hub
#[derive(Debug)]
pub struct PushClient {
    /// Unique client id
    pub id: String,
    /// Outbound frame queue; dropping this closes the client's writer
    sender: mpsc::Sender<String>,
    /// Host ids this client subscribed to
    subscriptions: HashSet<u32>,
}

impl PushClient {
    /// Creates a client around its outbound queue sender
    #[must_use]
    pub fn new(id: impl Into<String>, sender: mpsc::Sender<String>) -> Self {
        Self {
            id: id.into(),
            sender,
            subscriptions: HashSet::new(),
        }
    }
}

/// Shared membership state, mutated under short-held locks only
#[derive(Debug, Default)]
struct HubState {
    clients: RwLock<HashMap<String, PushClient>>,
    rooms: RwLock<HashMap<u32, HashSet<String>>>,
}

/// Handle to the broadcast hub; cheap to clone
#[derive(Debug, Clone)]
pub struct Hub {
    state: Arc<HubState>,
    register_tx: mpsc::Sender<PushClient>,
    unregister_tx: mpsc::Sender<String>,
    broadcast_tx: mpsc::Sender<String>,
}

/// Owns the hub's three inbound channels; run exactly once
#[derive(Debug)]
pub struct HubDispatcher {
    state: Arc<HubState>,
    register_rx: mpsc::Receiver<PushClient>,
    unregister_rx: mpsc::Receiver<String>,
    broadcast_rx: mpsc::Receiver<String>,
}

impl Hub {
    /// Creates a hub and its dispatcher; spawn [`HubDispatcher::run`]
    /// before registering clients
    #[must_use]
    pub fn new() -> (Self, HubDispatcher) {
        let state = Arc::new(HubState::default());
        let (register_tx, register_rx) = mpsc::channel(16);
        let (unregister_tx, unregister_rx) = mpsc::channel(16);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_CAPACITY);

        let hub = Self {
            state: Arc::clone(&state),
            register_tx,
            unregister_tx,
            broadcast_tx,
        };
        let dispatcher = HubDispatcher {
            state,
            register_rx,
            unregister_rx,
            broadcast_rx,
        };
        (hub, dispatcher)
    }

    /// Registers a push client and returns the receiving end of its
    /// outbound queue for the client's writer loop
    pub async fn register(&self, client_id: impl Into<String>) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let _ = self
            .register_tx
            .send(PushClient::new(client_id, tx))
            .await;
        rx
    }

    /// Unregisters a client, closing its outbound queue and leaving all
    /// rooms; idempotent
    pub async fn unregister(&self, client_id: &str) {
        let _ = self.unregister_tx.send(client_id.to_string()).await;
    }

    /// Subscribes a client to a host's room
    pub async fn subscribe(&self, client_id: &str, server_id: u32) {
        self.state
            .rooms
            .write()
            .await
            .entry(server_id)
            .or_default()
            .insert(client_id.to_string());
        if let Some(client) = self.state.clients.write().await.get_mut(client_id) {
            client.subscriptions.insert(server_id);
        }
    }

    /// Removes a client from a host's room
    pub async fn unsubscribe(&self, client_id: &str, server_id: u32) {
        if let Some(room) = self.state.rooms.write().await.get_mut(&server_id) {
            room.remove(client_id);
        }
        if let Some(client) = self.state.clients.write().await.get_mut(client_id) {
            client.subscriptions.remove(&server_id);
        }
    }

    /// Publishes a snapshot to every client, then to the host's room
    pub async fn broadcast_metrics(&self, snapshot: &MetricSnapshot) {
        let frame = Envelope::metrics(snapshot).to_json();
        let _ = self.broadcast_tx.send(frame.clone()).await;
        self.send_to_room(snapshot.server_id, &frame).await;
    }

    /// Publishes a host status change to every client
    pub async fn broadcast_status(&self, server_id: u32, status: ServerStatus) {
        let frame = Envelope::status(server_id, status).to_json();
        let _ = self.broadcast_tx.send(frame).await;
    }

    /// Enqueues a frame for one client; drops it when the queue is full
    pub async fn send_to(&self, client_id: &str, envelope: &Envelope) {
        let clients = self.state.clients.read().await;
        if let Some(client) = clients.get(client_id) {
            let _ = client.sender.try_send(envelope.to_json());
        }
    }

    /// Number of registered clients
    pub async fn client_count(&self) -> usize {
        self.state.clients.read().await.len()
    }

    /// Unregisters every client, closing all outbound queues
    ///
    /// Called during shutdown after the monitor pool has stopped; writer
    /// loops observe their queues closing and send close frames.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.state.clients.read().await.keys().cloned().collect();
        for id in ids {
            self.unregister(&id).await;
        }
    }

    async fn send_to_room(&self, server_id: u32, frame: &str) {
        let rooms = self.state.rooms.read().await;
        let Some(room) = rooms.get(&server_id) else {
            return;
        };
        let clients = self.state.clients.read().await;
        for client_id in room {
            if let Some(client) = clients.get(client_id) {
                let _ = client.sender.try_send(frame.to_string());
            }
        }
    }
}

impl HubDispatcher {
    /// Runs the dispatch loop until every hub handle is dropped
    ///
    /// The loop is the only place clients are added or removed, which
    /// keeps membership churn ordered with respect to broadcasts.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                client = self.register_rx.recv() => {
                    let Some(client) = client else { break };
                    tracing::info!(client_id = %client.id, "WebSocket client connected");
                    self.state.clients.write().await.insert(client.id.clone(), client);
                }
                client_id = self.unregister_rx.recv() => {
                    let Some(client_id) = client_id else { break };
                    let removed = self.state.clients.write().await.remove(&client_id);
                    if let Some(client) = removed {
                        let mut rooms = self.state.rooms.write().await;
                        for server_id in &client.subscriptions {
                            if let Some(room) = rooms.get_mut(server_id) {
                                room.remove(&client_id);
                            }
                        }
                        tracing::info!(client_id = %client_id, "WebSocket client disconnected");
                    }
                }
                frame = self.broadcast_rx.recv() => {
                    let Some(frame) = frame else { break };
                    let clients = self.state.clients.read().await;
                    for client in clients.values() {
                        // Lossy by contract: full queue means the frame is
                        // stale by the time the client catches up.
                        let _ = client.sender.try_send(frame.clone());
                    }
                }
            }
        }
    }
}
