// crates/server/src/ws.rs
//! The viewer WebSocket connection.
//!
//! Per connection: a bounded outbound queue feeding one writer task, and a
//! select loop over the client's inbound frames and the hub's two broadcast
//! channels. Every event is queued with `try_send`; a full queue means the
//! viewer cannot keep up and that one connection is closed; everyone else
//! is unaffected.
//!
//! Frame order per connection: `sessions:init` first, `session:messages_init`
//! as the first session-scoped frame after each subscribe. A message that
//! made it into a backlog snapshot is never re-delivered from the message
//! channel.

use std::collections::{HashMap, HashSet};

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use agentdeck_types::{ClientEvent, ServerEvent};

use crate::state::AppState;

/// Outbound frames buffered per viewer before it counts as too slow.
const VIEWER_QUEUE_CAP: usize = 128;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<ServerEvent>(VIEWER_QUEUE_CAP);
    let writer = tokio::spawn(write_loop(sink, out_rx));

    // Subscribe before snapshotting: anything that happens in between is
    // delivered twice at worst, never lost.
    let broadcast_rx = state.registry.hub().subscribe_broadcast();
    let message_rx = state.registry.hub().subscribe_messages();

    let sessions = state.registry.summaries().await;
    if out_tx
        .try_send(ServerEvent::SessionsInit { sessions })
        .is_err()
    {
        writer.abort();
        return;
    }

    read_loop(stream, state, out_tx, broadcast_rx, message_rx).await;
    writer.abort();
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    state: AppState,
    out_tx: mpsc::Sender<ServerEvent>,
    mut broadcast_rx: tokio::sync::broadcast::Receiver<ServerEvent>,
    mut message_rx: tokio::sync::broadcast::Receiver<ServerEvent>,
) {
    let mut subscriptions = Subscriptions::new();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_client_event(&state, &out_tx, &mut subscriptions, &text).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket read error");
                        break;
                    }
                }
            }
            event = broadcast_rx.recv() => {
                match event {
                    Ok(event) => {
                        if !queue(&out_tx, event) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // Lifecycle events carry full snapshots, so the next
                        // one repairs whatever was missed.
                        warn!(missed, "viewer lagged on the broadcast path");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            event = message_rx.recv() => {
                match subscriptions.route(event) {
                    MessageAction::Deliver(event) => {
                        if !queue(&out_tx, event) {
                            break;
                        }
                    }
                    MessageAction::Skip => {}
                    MessageAction::Disconnect => break,
                }
            }
        }
    }
}

/// What the read loop does with one message-path event.
enum MessageAction {
    Deliver(ServerEvent),
    Skip,
    Disconnect,
}

/// The viewer's per-session subscriptions, plus the ids each backlog
/// snapshot already delivered. Messages published while the snapshot was
/// being taken would otherwise arrive twice: once inside
/// `session:messages_init` and again from the message channel.
struct Subscriptions {
    sessions: HashSet<String>,
    snapshot_ids: HashMap<String, HashSet<String>>,
}

impl Subscriptions {
    fn new() -> Self {
        Self {
            sessions: HashSet::new(),
            snapshot_ids: HashMap::new(),
        }
    }

    fn subscribe(&mut self, session_id: String, snapshot: &[agentdeck_types::AgentMessage]) {
        self.snapshot_ids.insert(
            session_id.clone(),
            snapshot.iter().map(|m| m.id.clone()).collect(),
        );
        self.sessions.insert(session_id);
    }

    fn unsubscribe(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
        self.snapshot_ids.remove(session_id);
    }

    /// Route one received message-path event.
    ///
    /// Lag here is fatal for the connection: unlike the broadcast path,
    /// `session:new_message` events carry no snapshot, so a dropped one is
    /// a permanent gap for this viewer.
    fn route(&mut self, event: Result<ServerEvent, RecvError>) -> MessageAction {
        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "viewer lagged on the message path; disconnecting");
                return MessageAction::Disconnect;
            }
            Err(RecvError::Closed) => return MessageAction::Disconnect,
        };

        let Some(session_id) = event.session_id() else {
            return MessageAction::Skip;
        };
        if !self.sessions.contains(session_id) {
            return MessageAction::Skip;
        }

        if let ServerEvent::NewMessage { message, .. } = &event {
            if let Some(seen) = self.snapshot_ids.get_mut(session_id) {
                if seen.remove(&message.id) {
                    // Already delivered inside the snapshot.
                    return MessageAction::Skip;
                }
                // Ids are deterministic and the stream is ordered: once a
                // message past the snapshot shows up, nothing older follows.
                self.snapshot_ids.remove(session_id);
            }
        }

        MessageAction::Deliver(event)
    }
}

/// Returns `false` when the connection should close.
async fn handle_client_event(
    state: &AppState,
    out_tx: &mpsc::Sender<ServerEvent>,
    subscriptions: &mut Subscriptions,
    text: &str,
) -> bool {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::Subscribe { session_id }) => {
            // The backlog reply is unconditional; an unknown session gets an
            // empty one so the client always has a baseline to append to.
            let messages = state
                .registry
                .messages(&session_id)
                .await
                .unwrap_or_default();
            subscriptions.subscribe(session_id.clone(), &messages);
            queue(
                out_tx,
                ServerEvent::MessagesInit {
                    session_id,
                    messages,
                },
            )
        }
        Ok(ClientEvent::Unsubscribe { session_id }) => {
            subscriptions.unsubscribe(&session_id);
            true
        }
        Err(e) => {
            debug!(error = %e, "ignoring unparseable client frame");
            true
        }
    }
}

/// Queue one outbound event. `false` means the connection should close:
/// either the writer is gone or the viewer's queue is full.
fn queue(out_tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) -> bool {
    match out_tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("viewer outbound queue full; disconnecting slow consumer");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<ServerEvent>) {
    while let Some(event) = rx.recv().await {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize server event");
                continue;
            }
        };
        if sink.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}
