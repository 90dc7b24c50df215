// Realtime channel client: one WebSocket per subscription, speaking the
// Phoenix channel protocol used by the hosted realtime service.
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{ChannelFilter, RealtimeSubscription};
use crate::common::error::{ChatError, ChatResult};
use crate::common::models::MessageRow;

const HEARTBEAT_EVERY: Duration = Duration::from_secs(30);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixFrame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub join_ref: Option<String>,
}

/// What the client cares about in an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Reply { reference: Option<String>, ok: bool, reason: Option<String> },
    Insert(MessageRow),
    Closed(String),
    Ignored,
}

/// `https://x.supabase.co` → `wss://x.supabase.co/realtime/v1/websocket?apikey=..&vsn=1.0.0`
pub fn socket_url(base_url: &str, anon_key: &str) -> ChatResult<String> {
    let mut url = url::Url::parse(base_url)
        .map_err(|e| ChatError::Realtime(format!("invalid backend url: {}", e)))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(ChatError::Realtime(format!("unsupported scheme {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| ChatError::Realtime("cannot switch to websocket scheme".to_string()))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url.to_string())
}

pub fn join_frame(filter: ChannelFilter, access_token: &str, reference: &str) -> PhoenixFrame {
    PhoenixFrame {
        topic: filter.topic(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "INSERT",
                    "schema": "public",
                    "table": "messages",
                    "filter": filter.row_filter(),
                }]
            },
            "access_token": access_token,
        }),
        reference: Some(reference.to_string()),
        join_ref: Some(reference.to_string()),
    }
}

fn heartbeat_frame(reference: &str) -> PhoenixFrame {
    PhoenixFrame {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
        join_ref: None,
    }
}

fn leave_frame(filter: ChannelFilter, reference: &str) -> PhoenixFrame {
    PhoenixFrame {
        topic: filter.topic(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
        join_ref: None,
    }
}

pub fn parse_frame(text: &str) -> ChatResult<Inbound> {
    let frame: PhoenixFrame = serde_json::from_str(text)?;
    let inbound = match frame.event.as_str() {
        "phx_reply" => {
            let ok = frame.payload.get("status").and_then(Value::as_str) == Some("ok");
            let reason = frame
                .payload
                .pointer("/response/reason")
                .and_then(Value::as_str)
                .map(str::to_string);
            Inbound::Reply { reference: frame.reference, ok, reason }
        }
        "postgres_changes" => {
            let data = frame.payload.get("data").cloned().unwrap_or(Value::Null);
            let kind = data.get("type").and_then(Value::as_str).unwrap_or("");
            match (kind, data.get("record")) {
                ("INSERT", Some(record)) => Inbound::Insert(serde_json::from_value(record.clone())?),
                _ => Inbound::Ignored,
            }
        }
        "phx_error" | "phx_close" => Inbound::Closed(frame.event),
        "system" if frame.payload.get("status").and_then(Value::as_str) == Some("error") => {
            let msg = frame.payload.get("message").and_then(Value::as_str).unwrap_or("system error");
            Inbound::Closed(msg.to_string())
        }
        _ => Inbound::Ignored,
    };
    Ok(inbound)
}

fn encode(frame: &PhoenixFrame) -> ChatResult<Message> {
    Ok(Message::Text(serde_json::to_string(frame)?))
}

/// Opens a socket, joins the channel for `filter` and returns once the join
/// is acknowledged. Events are forwarded in the background until the
/// subscription is disposed or the server closes the channel.
pub async fn open_channel(socket_url: &str, access_token: &str, filter: ChannelFilter) -> ChatResult<RealtimeSubscription> {
    log::info!("[REALTIME] connecting for {}", filter.topic());
    let (ws_stream, _) = connect_async(socket_url)
        .await
        .map_err(|e| ChatError::Realtime(format!("connection failed: {}", e)))?;
    let (mut sink, mut stream) = ws_stream.split();

    let mut next_ref: u64 = 1;
    let join_ref = next_ref.to_string();
    sink.send(encode(&join_frame(filter, access_token, &join_ref))?)
        .await
        .map_err(|e| ChatError::Realtime(format!("join failed: {}", e)))?;

    // Attendi la conferma del join
    let joined = timeout(JOIN_TIMEOUT, async {
        while let Some(msg) = stream.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => return Err(ChatError::Realtime("closed during join".to_string())),
                Ok(_) => continue,
                Err(e) => return Err(ChatError::Realtime(e.to_string())),
            };
            match parse_frame(&text) {
                Ok(Inbound::Reply { reference, ok, reason }) if reference.as_deref() == Some(join_ref.as_str()) => {
                    return if ok {
                        Ok(())
                    } else {
                        Err(ChatError::Realtime(reason.unwrap_or_else(|| "join rejected".to_string())))
                    };
                }
                Ok(Inbound::Closed(reason)) => return Err(ChatError::Realtime(reason)),
                Ok(_) => {}
                Err(e) => return Err(e),
            }
        }
        Err::<(), ChatError>(ChatError::Realtime("connection closed during join".to_string()))
    })
    .await
    .map_err(|_| ChatError::Realtime("join timed out".to_string()))?;
    joined?;
    log::info!("[REALTIME] joined {}", filter.topic());

    let (tx, rx) = mpsc::unbounded_channel::<MessageRow>();
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_EVERY, HEARTBEAT_EVERY);
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    next_ref += 1;
                    if let Ok(frame) = encode(&leave_frame(filter, &next_ref.to_string())) {
                        let _ = sink.send(frame).await;
                    }
                    let _ = sink.close().await;
                    break;
                }
                _ = heartbeat.tick() => {
                    next_ref += 1;
                    let sent = match encode(&heartbeat_frame(&next_ref.to_string())) {
                        Ok(frame) => sink.send(frame).await.is_ok(),
                        Err(_) => false,
                    };
                    if !sent {
                        log::warn!("[REALTIME] heartbeat failed on {}", filter.topic());
                        break;
                    }
                }
                msg = stream.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("[REALTIME] server closed {}", filter.topic());
                            break;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            log::warn!("[REALTIME] socket error on {}: {}", filter.topic(), e);
                            break;
                        }
                    };
                    match parse_frame(&text) {
                        Ok(Inbound::Insert(row)) if filter.matches(&row) => {
                            if tx.send(row).is_err() {
                                // subscriber gone
                                break;
                            }
                        }
                        Ok(Inbound::Closed(reason)) => {
                            log::warn!("[REALTIME] channel {} closed: {}", filter.topic(), reason);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => log::debug!("[REALTIME] unparsed frame: {}", e),
                    }
                }
            }
        }
        log::debug!("[REALTIME] task for {} ended", filter.topic());
    });

    Ok(RealtimeSubscription::new(filter, rx, stop_tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn socket_url_switches_scheme_and_path() {
        let url = socket_url("https://abc.supabase.co", "anon").unwrap();
        assert_eq!(url, "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0");
        let url = socket_url("http://localhost:54321/", "k").unwrap();
        assert!(url.starts_with("ws://localhost:54321/realtime/v1/websocket?"));
    }

    #[test]
    fn join_frame_carries_insert_filter() {
        let group = Uuid::new_v4();
        let frame = join_frame(ChannelFilter::GroupInserts(group), "jwt", "1");
        assert_eq!(frame.event, "phx_join");
        let change = &frame.payload["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "INSERT");
        assert_eq!(change["table"], "messages");
        assert_eq!(change["filter"], format!("group_id=eq.{}", group));
        let text = serde_json::to_string(&frame).unwrap();
        assert!(text.contains("\"ref\":\"1\""));
    }

    #[test]
    fn parses_insert_and_reply_frames() {
        let group = Uuid::new_v4();
        let insert = json!({
            "topic": "realtime:group-x",
            "event": "postgres_changes",
            "payload": { "data": {
                "type": "INSERT",
                "table": "messages",
                "record": {
                    "id": Uuid::new_v4(),
                    "sender_id": Uuid::new_v4(),
                    "group_id": group,
                    "message_type": "text",
                    "content": "ciao",
                    "created_at": "2024-05-01T10:00:00Z"
                }
            }, "ids": [1] },
            "ref": null
        });
        match parse_frame(&insert.to_string()).unwrap() {
            Inbound::Insert(row) => {
                assert_eq!(row.group_id, Some(group));
                assert_eq!(row.text(), "ciao");
            }
            other => panic!("unexpected {:?}", other),
        }

        let reply = json!({"topic":"t","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"});
        assert_eq!(
            parse_frame(&reply.to_string()).unwrap(),
            Inbound::Reply { reference: Some("1".into()), ok: true, reason: None }
        );

        let update = json!({"topic":"t","event":"postgres_changes","payload":{"data":{"type":"UPDATE","record":{}}}});
        assert_eq!(parse_frame(&update.to_string()).unwrap(), Inbound::Ignored);
    }
}
