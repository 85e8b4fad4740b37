//! Webhook payloads pushed by the gateway about account state.
//!
//! The embedding application owns the HTTP endpoint and hands the decoded
//! body to [`crate::PlatformClient::receive`], which fans events out to
//! subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::{LoginMeta, PersonalInfo, ProxyConfig};

const WEBHOOK_CAPACITY: usize = 256;

/// Raw webhook body: `{ "payload": [{ "type", "data", "timestamp" }] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub payload: Vec<WebhookPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Vec<Value>,
    pub timestamp: i64,
}

/// Decoded account event.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Online {
        timestamp: i64,
        wxid: String,
        info: Box<PersonalInfo>,
        meta: LoginMeta,
    },
    Offline {
        timestamp: i64,
        wxid: String,
    },
    Proxy {
        timestamp: i64,
        wxid: String,
        proxy: ProxyConfig,
    },
    Forbidden {
        timestamp: i64,
        wxid: String,
    },
    Reconnect {
        timestamp: i64,
        wxid: String,
    },
    Remove {
        timestamp: i64,
        wxid: String,
    },
}

impl WebhookEvent {
    pub fn wxid(&self) -> &str {
        match self {
            WebhookEvent::Online { wxid, .. }
            | WebhookEvent::Offline { wxid, .. }
            | WebhookEvent::Proxy { wxid, .. }
            | WebhookEvent::Forbidden { wxid, .. }
            | WebhookEvent::Reconnect { wxid, .. }
            | WebhookEvent::Remove { wxid, .. } => wxid,
        }
    }
}

fn arg<T: serde::de::DeserializeOwned>(data: &[Value], index: usize, kind: &str) -> Option<T> {
    let value = data.get(index)?;
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(kind, index, error = %e, "Malformed webhook argument");
            None
        }
    }
}

impl TryFrom<&WebhookPayload> for WebhookEvent {
    type Error = String;

    fn try_from(payload: &WebhookPayload) -> Result<Self, Self::Error> {
        let kind = payload.kind.as_str();
        let data = payload.data.as_slice();
        let timestamp = payload.timestamp;
        let wxid: String = arg(data, 0, kind).ok_or_else(|| format!("{kind}: missing wxid"))?;

        let event = match kind {
            "online" => WebhookEvent::Online {
                timestamp,
                wxid,
                info: Box::new(arg(data, 1, kind).ok_or("online: missing info")?),
                meta: arg(data, 2, kind).ok_or("online: missing meta")?,
            },
            "offline" => WebhookEvent::Offline { timestamp, wxid },
            "proxy" => WebhookEvent::Proxy {
                timestamp,
                wxid,
                proxy: arg(data, 1, kind).ok_or("proxy: missing proxy")?,
            },
            // The gateway spells it "forbiden".
            "forbiden" | "forbidden" => WebhookEvent::Forbidden { timestamp, wxid },
            "reconnect" => WebhookEvent::Reconnect { timestamp, wxid },
            "remove" => WebhookEvent::Remove { timestamp, wxid },
            other => return Err(format!("unknown webhook type {other}")),
        };
        Ok(event)
    }
}

/// Broadcast hub for decoded webhook events.
#[derive(Debug, Clone)]
pub struct WebhookHub {
    tx: broadcast::Sender<WebhookEvent>,
}

impl WebhookHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(WEBHOOK_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WebhookEvent> {
        self.tx.subscribe()
    }

    /// Decode and publish every payload entry, in order. Undecodable entries
    /// are logged and skipped.
    pub fn dispatch(&self, message: WebhookMessage) -> usize {
        let mut delivered = 0;
        for payload in &message.payload {
            match WebhookEvent::try_from(payload) {
                Ok(event) => {
                    debug!(kind = %payload.kind, wxid = event.wxid(), "Webhook event");
                    let _ = self.tx.send(event);
                    delivered += 1;
                }
                Err(reason) => warn!(%reason, "Dropping webhook payload"),
            }
        }
        delivered
    }
}

impl Default for WebhookHub {
    fn default() -> Self {
        Self::new()
    }
}
