//! WebSocket streaming of committed transactions.
//!
//! Connect to `/api/v1/ws/transactions` (optionally `?jarId=<id>`) to receive
//! every transaction committed after the connection opened, as JSON frames:
//!
//! - `{"type":"transaction", ...}` for each committed change
//! - `{"type":"lagged","missed":N}` when the client fell behind and frames
//!   were dropped; re-fetch the jar's history to recover
//! - `{"type":"heartbeat","timestamp":ms}` periodically to keep the link alive
//!
//! There is no replay: history comes from the REST API.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use swearjar_ledger::{id::now_millis, JarEvent};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use crate::broadcast::{Delivery, Subscription};
use crate::node::NodeState;

/// Query parameters for the transaction feed
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    /// Restrict the feed to one jar
    pub jar_id: Option<String>,
}

/// WebSocket handler for the transaction feed
pub async fn ws_transactions_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<FeedQuery>,
    State(state): State<Arc<NodeState>>,
) -> impl IntoResponse {
    // Subscribe before the upgrade so nothing committed after the request
    // arrived is missed.
    let jar_filter = query.jar_id.filter(|id| !id.trim().is_empty());
    let subscription = state.broadcaster.subscribe(jar_filter);
    let heartbeat = state.config.heartbeat_interval;
    ws.on_upgrade(move |socket| handle_transaction_socket(socket, subscription, heartbeat))
}

/// Map a broadcaster delivery onto the wire event.
pub fn delivery_to_event(delivery: Delivery) -> JarEvent {
    match delivery {
        Delivery::Transaction(transaction) => JarEvent::Transaction(transaction),
        Delivery::Lagged(missed) => JarEvent::Lagged { missed },
    }
}

/// Pump transactions to one client until either side goes away.
async fn handle_transaction_socket(
    mut socket: WebSocket,
    mut subscription: Subscription,
    heartbeat_every: Duration,
) {
    info!(jar_filter = ?subscription.jar_filter(), "WebSocket client subscribed to transactions");

    let mut heartbeat = interval_at(Instant::now() + heartbeat_every, heartbeat_every);

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!("Ignoring client frame: {}", text);
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            // Forward committed transactions
            delivery = subscription.recv() => {
                let Some(delivery) = delivery else {
                    info!("Broadcaster closed, ending transaction feed");
                    break;
                };
                if let Err(e) = send_event(&mut socket, delivery_to_event(delivery)).await {
                    warn!("Failed to send transaction: {}", e);
                    break;
                }
            }
            _ = heartbeat.tick() => {
                let event = JarEvent::Heartbeat { timestamp: now_millis() };
                if let Err(e) = send_event(&mut socket, event).await {
                    warn!("Failed to send heartbeat: {}", e);
                    break;
                }
            }
        }
    }
}

/// Send a jar event over WebSocket
async fn send_event(socket: &mut WebSocket, event: JarEvent) -> Result<(), axum::Error> {
    let json = serde_json::to_string(&event).map_err(axum::Error::new)?;
    socket.send(Message::Text(json)).await
}
