use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use harmony_types::events::{GatewayCommand, GatewayEvent};

use crate::session::Session;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const BREATHING_TICK: Duration = Duration::from_secs(1);

/// Drive a pre-authenticated WebSocket connection. The JWT was already
/// validated at the HTTP upgrade layer, so the session starts with Ready.
///
/// One loop owns the session: client commands, live snapshots, breathing
/// ticks and the heartbeat are all handled in turn, so no component is ever
/// touched from two places at once.
pub async fn handle_connection(socket: WebSocket, mut session: Session, seed_defaults: bool) {
    let (mut sender, mut receiver) = socket.split();
    let user_id = session.user().id.clone();

    info!("{} connected to gateway", user_id);

    for event in session.start(seed_defaults).await {
        if send_event(&mut sender, &event).await.is_err() {
            return;
        }
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;
    let mut pong_received = true;

    let mut breathing = tokio::time::interval(BREATHING_TICK);
    breathing.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'conn: loop {
        let outgoing: Vec<GatewayEvent> = tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        let was_breathing = session.is_breathing();
                        let events = session.handle(cmd).await;
                        if !was_breathing && session.is_breathing() {
                            // First tick lands one full second after start
                            breathing.reset();
                        }
                        events
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                        vec![GatewayEvent::Error {
                            message: "Unrecognised command.".into(),
                        }]
                    }
                },
                Some(Ok(Message::Pong(_))) => {
                    pong_received = true;
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!("{} socket error: {}", user_id, e);
                    break;
                }
            },
            update = session.next_update() => update.into_iter().collect(),
            _ = breathing.tick(), if session.is_breathing() => session.tick().into_iter().collect(),
            _ = heartbeat.tick() => {
                if std::mem::replace(&mut pong_received, false) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Heartbeat timeout (missed {} pongs), dropping {}", missed_heartbeats, user_id);
                        break;
                    }
                }
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
                continue;
            }
        };

        for event in &outgoing {
            if send_event(&mut sender, event).await.is_err() {
                break 'conn;
            }
        }
    }

    // Dropping the session cancels every live subscription it holds.
    drop(session);
    info!("{} disconnected from gateway", user_id);
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to encode gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}
