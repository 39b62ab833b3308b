use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, warn};

use pulsar_core::{EventEnvelope, OrgId};

use super::AppState;
use crate::auth::CallerIdentity;

/// Server ping cadence.
const PING_INTERVAL: Duration = Duration::from_secs(54);
/// A client that has not ponged within this window is disconnected.
const PONG_DEADLINE: Duration = Duration::from_secs(60);

/// `GET /ws` -- upgrade to the live event stream for the caller's
/// organization.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run(socket, state, identity))
}

fn frame(
    kind: &str,
    org: OrgId,
    payload: serde_json::Value,
    timestamp: DateTime<Utc>,
) -> String {
    serde_json::json!({
        "type": kind,
        "organization_id": org,
        "timestamp": timestamp,
        "payload": payload,
    })
    .to_string()
}

fn envelope_frame(envelope: &EventEnvelope) -> String {
    frame(
        envelope.event_type.as_str(),
        envelope.organization_id,
        envelope.data.clone(),
        envelope.timestamp,
    )
}

async fn run(socket: WebSocket, state: AppState, identity: CallerIdentity) {
    let org = identity.organization_id;
    let mut subscription = state.bus.subscribe(org);
    let (mut sender, mut receiver) = socket.split();

    debug!(org_id = %org, "websocket subscriber connected");
    let hello = frame("connected", org, serde_json::json!({}), state.now());
    if sender.send(Message::Text(hello.into())).await.is_err() {
        return;
    }

    let mut ping_timer = interval(PING_INTERVAL);
    ping_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first interval tick completes immediately; treat it as the
    // connection ping.
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            _ = ping_timer.tick() => {
                if last_pong.elapsed() > PONG_DEADLINE {
                    debug!(org_id = %org, "websocket pong deadline exceeded, closing");
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            envelope = subscription.recv() => {
                let Some(envelope) = envelope else {
                    // The hub dropped this subscriber (buffer overflow).
                    warn!(org_id = %org, "websocket subscriber dropped by bus");
                    break;
                };
                if sender
                    .send(Message::Text(envelope_frame(&envelope).into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Clients may also keep the link alive with JSON
                        // ping frames.
                        let is_ping = serde_json::from_str::<serde_json::Value>(text.as_str())
                            .ok()
                            .and_then(|v| v.get("type").and_then(|t| t.as_str().map(str::to_owned)))
                            .is_some_and(|t| t == "ping");
                        if is_ping {
                            last_pong = Instant::now();
                            let pong = frame("pong", org, serde_json::json!({}), state.now());
                            if sender.send(Message::Text(pong.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Binary(_))) => {}
                    Some(Err(err)) => {
                        debug!(org_id = %org, error = %err, "websocket read error");
                        break;
                    }
                }
            }
        }
    }
    debug!(org_id = %org, "websocket subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_shape_matches_protocol() {
        let org = OrgId::generate();
        let raw = frame("alert.created", org, serde_json::json!({"id": 1}), Utc::now());
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "alert.created");
        assert_eq!(value["organization_id"], org.to_string());
        assert_eq!(value["payload"]["id"], 1);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn envelope_frame_uses_event_type() {
        let envelope = EventEnvelope::new(
            pulsar_core::EventType::AlertClosed,
            OrgId::generate(),
            serde_json::json!({"alert_id": "x"}),
            Utc::now(),
        );
        let value: serde_json::Value =
            serde_json::from_str(&envelope_frame(&envelope)).unwrap();
        assert_eq!(value["type"], "alert.closed");
        assert_eq!(value["payload"]["alert_id"], "x");
    }
}
