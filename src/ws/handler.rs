use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::approval::JoinWorkflow;
use crate::hub::HubHandle;
use crate::ws::protocol;

/// Shared application state passed to all handlers via axum State extractor
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub joins: Arc<Mutex<JoinWorkflow>>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection actor: a writer task owns the sink, fed by an unbounded
/// channel whose only sender lives in the hub registry; the read loop below
/// dispatches inbound text frames until the peer goes away.
///
/// There is no heartbeat and no external cancellation: teardown happens
/// only on a read error, a close frame, or a failed broadcast write. A
/// silently dead peer is noticed on its next failed write or read.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(writer_task(ws_sender, rx));
    let conn_id = state.hub.register(tx);

    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                protocol::dispatch_frame(&state, text.as_str()).await;
            }
            Some(Ok(Message::Close(frame))) => {
                info!(connection = %conn_id, reason = ?frame, "client initiated close");
                break;
            }
            // Binary frames are not part of the protocol; ping/pong is
            // answered by the transport.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(connection = %conn_id, error = %e, "read error");
                break;
            }
            None => break,
        }
    }

    // The hub holds the only outbound sender, so unregistering also ends
    // the writer task and closes the transport.
    state.hub.unregister(conn_id);
}

/// Writer task: receives messages from the hub and forwards them to the
/// WebSocket sink.
async fn writer_task(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // Send failed — the connection is broken. The hub notices on
            // its next write and evicts us.
            break;
        }
    }
}
