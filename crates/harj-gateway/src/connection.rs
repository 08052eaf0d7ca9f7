use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use harj_types::UserId;
use harj_types::events::{ChatEvent, GatewayCommand};

use crate::dispatcher::Dispatcher;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve one WebSocket client: wait for `Identify`, then push every event
/// that concerns the identified user until either side goes away.
pub async fn handle_connection(mut socket: WebSocket, dispatcher: Dispatcher) {
    let Some(user_id) = wait_for_identify(&mut socket).await else {
        warn!("WebSocket client failed to identify, closing");
        return;
    };

    info!("user {} connected to gateway", user_id);
    dispatcher.user_online(user_id).await;

    forward_events(socket, &dispatcher, user_id).await;

    dispatcher.user_offline(user_id).await;
    info!("user {} disconnected from gateway", user_id);
}

/// Ping liveness: a pong must arrive between two consecutive pings.
struct Heartbeat {
    awaiting_pong: bool,
    missed: u8,
}

impl Heartbeat {
    const MAX_MISSED: u8 = 2;

    fn new() -> Self {
        Self { awaiting_pong: false, missed: 0 }
    }

    fn pong(&mut self) {
        self.awaiting_pong = false;
    }

    /// Record a ping going out. Returns false once the peer is considered dead.
    fn ping(&mut self) -> bool {
        if self.awaiting_pong {
            self.missed += 1;
        } else {
            self.missed = 0;
        }
        self.awaiting_pong = true;
        self.missed < Self::MAX_MISSED
    }
}

async fn forward_events(mut socket: WebSocket, dispatcher: &Dispatcher, user_id: UserId) {
    let mut events = dispatcher.subscribe();
    let mut heartbeat = Heartbeat::new();
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            result = events.recv() => match result {
                Ok(event) if event.concerns(user_id) => {
                    let Some(text) = encode_event(&event) else { continue };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    warn!("gateway stream for user {} skipped {} events", user_id, n);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Pong(_))) => heartbeat.pong(),
                Some(Ok(Message::Text(text))) => debug!(
                    "user {} sent ignored command: {}",
                    user_id,
                    text.chars().take(200).collect::<String>()
                ),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = ticker.tick() => {
                if !heartbeat.ping() {
                    warn!("user {} missed {} pongs, dropping gateway connection", user_id, heartbeat.missed);
                    break;
                }
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn wait_for_identify(socket: &mut WebSocket) -> Option<UserId> {
    let identify = async {
        while let Some(Ok(msg)) = socket.recv().await {
            if let Message::Text(text) = msg {
                match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::Identify { user_id }) => return Some(user_id),
                    Err(e) => warn!("bad gateway command before identify: {}", e),
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

fn encode_event(event: &ChatEvent) -> Option<String> {
    serde_json::to_string(event)
        .inspect_err(|e| warn!("failed to encode gateway event: {}", e))
        .ok()
}
