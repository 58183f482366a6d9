//! Realtime push channel.
//!
//! Supabase Realtime speaks the Phoenix channel protocol over a websocket.
//! A channel is joined with a `postgres_changes` filter for one table; the
//! server then pushes a `postgres_changes` message for every insert, update
//! and delete. The connection is kept alive with heartbeats on the `phoenix`
//! topic and left with `phx_leave` when the feed is dropped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use dccu_proto::{ChangeEvent, ChangeType, TableName};

use super::ChangeFeed;
use crate::config::ClientConfig;
use crate::error::{BackendError, BackendResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Buffered change events per feed.
const FEED_CAPACITY: usize = 64;

/// Reference used for the join message.
const JOIN_REF: &str = "1";

/// A Phoenix channel message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
}

impl PhoenixMessage {
    fn new(topic: impl Into<String>, event: &str, payload: Value, msg_ref: String) -> Self {
        Self {
            topic: topic.into(),
            event: event.to_string(),
            payload,
            msg_ref: Some(msg_ref),
        }
    }
}

/// Channel topic for a table, e.g. `realtime:movies_changes`.
pub fn topic_for(table: TableName) -> String {
    format!("realtime:{}", table.channel_name())
}

/// Join a table's change channel, listening to every event in `schema`.
pub fn join_message(table: TableName, schema: &str, access_token: &str) -> PhoenixMessage {
    let payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [
                { "event": "*", "schema": schema, "table": table.as_str() }
            ]
        },
        "access_token": access_token,
    });
    PhoenixMessage::new(topic_for(table), "phx_join", payload, JOIN_REF.to_string())
}

/// Leave a channel.
pub fn leave_message(topic: &str, msg_ref: u64) -> PhoenixMessage {
    PhoenixMessage::new(topic, "phx_leave", json!({}), msg_ref.to_string())
}

/// Keep the socket alive.
pub fn heartbeat_message(msg_ref: u64) -> PhoenixMessage {
    PhoenixMessage::new("phoenix", "heartbeat", json!({}), msg_ref.to_string())
}

/// Outcome of a join, if `msg` is the reply to it.
pub fn join_reply(msg: &PhoenixMessage, topic: &str) -> Option<BackendResult<()>> {
    if msg.event != "phx_reply" || msg.topic != topic || msg.msg_ref.as_deref() != Some(JOIN_REF) {
        return None;
    }

    match msg.payload.get("status").and_then(Value::as_str) {
        Some("ok") => Some(Ok(())),
        _ => {
            let reason = msg
                .payload
                .pointer("/response/reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| msg.payload.to_string());
            Some(Err(BackendError::Subscription(format!(
                "join rejected for {}: {}",
                topic, reason
            ))))
        }
    }
}

/// Translate a `postgres_changes` push into a change event.
pub fn change_event(msg: &PhoenixMessage, table: TableName) -> Option<ChangeEvent> {
    if msg.event != "postgres_changes" {
        return None;
    }

    let data = msg.payload.get("data")?;
    let change_type = data
        .get("type")
        .or_else(|| data.get("eventType"))
        .and_then(Value::as_str)
        .and_then(ChangeType::from_wire)?;

    let event = ChangeEvent::new(table, change_type);
    let commit_timestamp = data
        .get("commit_timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    Some(match commit_timestamp {
        Some(ts) => event.with_commit_timestamp(ts),
        None => event,
    })
}

/// Connect, join the table's channel and start pumping events.
///
/// Fails if the socket cannot be opened or the join is rejected. There is no
/// retry; the caller decides what to do with the error.
pub async fn subscribe(config: &ClientConfig, table: TableName) -> BackendResult<ChangeFeed> {
    let url = config
        .realtime_url()
        .map_err(|e| BackendError::Subscription(e.to_string()))?;

    let (mut ws, _response) = tokio::time::timeout(config.timeout, tokio_tungstenite::connect_async(url.as_str()))
        .await
        .map_err(|_| BackendError::Timeout)??;

    let topic = topic_for(table);
    send(&mut ws, &join_message(table, &config.schema, config.bearer())).await?;

    tokio::time::timeout(config.timeout, await_join(&mut ws, &topic))
        .await
        .map_err(|_| BackendError::Timeout)??;

    tracing::debug!(table = %table, topic = %topic, "realtime channel joined");

    let (tx, rx) = mpsc::channel(FEED_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(run_channel(
        ws,
        table,
        topic,
        config.heartbeat_interval,
        tx,
        shutdown_rx,
    ));

    Ok(ChangeFeed::new(table, rx, Some(shutdown_tx)))
}

async fn send(ws: &mut WsStream, msg: &PhoenixMessage) -> BackendResult<()> {
    let text = serde_json::to_string(msg)?;
    ws.send(Message::Text(text)).await?;
    Ok(())
}

async fn await_join(ws: &mut WsStream, topic: &str) -> BackendResult<()> {
    while let Some(frame) = ws.next().await {
        if let Message::Text(text) = frame? {
            let Ok(msg) = serde_json::from_str::<PhoenixMessage>(&text) else {
                continue;
            };
            if let Some(outcome) = join_reply(&msg, topic) {
                return outcome;
            }
        }
    }
    Err(BackendError::Subscription(format!(
        "connection closed before {} was joined",
        topic
    )))
}

async fn run_channel(
    mut ws: WsStream,
    table: TableName,
    topic: String,
    heartbeat_interval: Duration,
    events: mpsc::Sender<ChangeEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = send(&mut ws, &leave_message(&topic, next_ref)).await {
                    tracing::debug!(topic = %topic, error = %e, "failed to send leave");
                }
                let _ = ws.close(None).await;
                break;
            }
            _ = heartbeat.tick() => {
                if let Err(e) = send(&mut ws, &heartbeat_message(next_ref)).await {
                    tracing::warn!(topic = %topic, error = %e, "realtime heartbeat failed");
                    break;
                }
                next_ref += 1;
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let msg = match serde_json::from_str::<PhoenixMessage>(&text) {
                        Ok(msg) => msg,
                        Err(e) => {
                            tracing::debug!(topic = %topic, error = %e, "ignoring malformed frame");
                            continue;
                        }
                    };

                    if let Some(event) = change_event(&msg, table) {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    } else if msg.topic == topic && (msg.event == "phx_error" || msg.event == "phx_close") {
                        tracing::warn!(topic = %topic, event = %msg.event, "realtime channel closed by server");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(topic = %topic, "realtime socket closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(topic = %topic, error = %e, "realtime socket error");
                    break;
                }
            },
        }
    }

    tracing::debug!(table = %table, topic = %topic, "realtime channel released");
}
