use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::ws::protocol::{ChatMessage, Envelope};

/// Outbound frame channel for one connection. The write half of the
/// connection's writer task; dropping it closes the transport.
pub type OutboundSender = mpsc::UnboundedSender<Message>;

/// Opaque handle to a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Operations consumed by the hub actor, applied strictly one at a time.
enum HubCommand {
    Register {
        id: ConnectionId,
        outbound: OutboundSender,
    },
    Unregister {
        id: ConnectionId,
    },
    Broadcast {
        message: ChatMessage,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

struct RegisteredConnection {
    outbound: OutboundSender,
    /// Identity label attached at registration. No current flow populates
    /// it; every connection carries the empty label.
    label: String,
}

/// Maintains the authoritative set of live connections and delivers chat
/// broadcasts. The registry is owned by a single actor task; register,
/// unregister and broadcast all funnel through its command channel, so the
/// hub observes and applies them in one total order. No lock guards the
/// registry and none is needed.
///
/// Approval status never gates registration or delivery: any connected
/// client sends and receives broadcasts whether or not its identity was
/// ever approved.
pub struct Hub {
    connections: HashMap<ConnectionId, RegisteredConnection>,
}

/// Cloneable front-end to the hub actor. Register/unregister/broadcast are
/// fire-and-forget; a send after the actor has stopped is silently dropped.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
    next_id: Arc<AtomicU64>,
}

impl Hub {
    /// Start the hub actor and return a handle to it.
    pub fn spawn() -> HubHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Hub {
            connections: HashMap::new(),
        };
        tokio::spawn(hub.run(rx));
        HubHandle {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HubCommand>) {
        while let Some(command) = rx.recv().await {
            self.apply(command);
        }
        debug!("hub actor stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, outbound } => {
                self.connections.insert(
                    id,
                    RegisteredConnection {
                        outbound,
                        label: String::new(),
                    },
                );
                info!(connection = %id, "new client connected");
            }
            HubCommand::Unregister { id } => {
                // Absent ids are a no-op: a connection evicted by a failed
                // broadcast write will still unregister itself when its
                // read loop ends.
                if let Some(conn) = self.connections.remove(&id) {
                    debug!(connection = %id, label = %conn.label, "client disconnected");
                }
            }
            HubCommand::Broadcast { message } => self.broadcast(message),
            HubCommand::Count { reply } => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    /// Serialize the envelope once, then attempt one independent write per
    /// registered connection. A failed write evicts that connection but
    /// never aborts delivery to the rest.
    fn broadcast(&mut self, message: ChatMessage) {
        let text = match serde_json::to_string(&Envelope::Chat(message)) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to serialize chat message");
                return;
            }
        };
        let frame = Message::Text(text.into());

        let mut dead = Vec::new();
        for (id, conn) in &self.connections {
            if conn.outbound.send(frame.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            warn!(connection = %id, "write failed, evicting connection");
            self.connections.remove(&id);
        }
    }
}

impl HubHandle {
    /// Register a connection with an empty identity label. Fire-and-forget;
    /// the returned id is this connection's handle for later unregister.
    pub fn register(&self, outbound: OutboundSender) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.tx.send(HubCommand::Register { id, outbound });
        id
    }

    /// Remove a connection and close its transport (the hub holds the only
    /// outbound sender, so removal tears down the writer task). A no-op if
    /// the id is not registered.
    pub fn unregister(&self, id: ConnectionId) {
        let _ = self.tx.send(HubCommand::Unregister { id });
    }

    /// Fan a chat message out to every registered connection.
    pub fn broadcast(&self, message: ChatMessage) {
        let _ = self.tx.send(HubCommand::Broadcast { message });
    }

    /// Number of registered connections. Queued behind any in-flight
    /// commands from this handle, so it doubles as a flush barrier in tests.
    pub async fn connection_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HubCommand::Count { reply }).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
