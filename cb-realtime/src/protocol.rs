//! Phoenix channel wire protocol.
//!
//! Every frame is a JSON object `{topic, event, payload, ref, join_ref}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cb_core::config::AppConfig;
use cb_core::constants;
use cb_core::error::{CbError, CbResult};

/// Protocol event names.
pub mod events {
    pub const JOIN: &str = "phx_join";
    pub const LEAVE: &str = "phx_leave";
    pub const REPLY: &str = "phx_reply";
    pub const ERROR: &str = "phx_error";
    pub const CLOSE: &str = "phx_close";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const POSTGRES_CHANGES: &str = "postgres_changes";
    pub const SYSTEM: &str = "system";
}

/// Topic used for connection-level frames such as heartbeats.
pub const PHOENIX_TOPIC: &str = "phoenix";

/// Prefix the server expects on channel topics.
pub const TOPIC_PREFIX: &str = "realtime:";

/// A single protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub join_ref: Option<String>,
}

impl Frame {
    pub fn new(topic: &str, event: &str, payload: Value) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: None,
            join_ref: None,
        }
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_join_ref(mut self, join_ref: impl Into<String>) -> Self {
        self.join_ref = Some(join_ref.into());
        self
    }

    pub fn heartbeat(reference: impl Into<String>) -> Self {
        Self::new(PHOENIX_TOPIC, events::HEARTBEAT, json!({})).with_ref(reference)
    }

    pub fn encode(&self) -> CbResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> CbResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| CbError::Realtime(format!("malformed frame: {e}")))
    }

    /// `status` of a `phx_reply` payload.
    pub fn reply_status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }
}

/// Row change kind. `All` subscribes to every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeEvent {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "*")]
    All,
}

impl ChangeEvent {
    /// Whether a subscription to `self` receives a change of kind `kind`.
    pub fn accepts(&self, kind: ChangeEvent) -> bool {
        *self == ChangeEvent::All || *self == kind
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeEvent::Insert => "INSERT",
            ChangeEvent::Update => "UPDATE",
            ChangeEvent::Delete => "DELETE",
            ChangeEvent::All => "*",
        }
    }
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `postgres_changes` subscription inside a channel join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresChangeFilter {
    pub event: ChangeEvent,
    pub schema: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl PostgresChangeFilter {
    pub fn new(event: ChangeEvent, schema: &str, table: &str) -> Self {
        Self {
            event,
            schema: schema.to_string(),
            table: table.to_string(),
            filter: None,
        }
    }

    /// Restrict to rows where `column` equals `value`.
    pub fn eq(mut self, column: &str, value: impl std::fmt::Display) -> Self {
        self.filter = Some(format!("{column}=eq.{value}"));
        self
    }

    /// Whether this filter is the one the server acknowledged as `other`.
    pub fn same_as(&self, other: &PostgresChangeFilter) -> bool {
        self.event == other.event
            && self.schema == other.schema
            && self.table == other.table
            && self.filter.as_deref().unwrap_or("") == other.filter.as_deref().unwrap_or("")
    }
}

/// Server acknowledgement of one filter in a join reply.
#[derive(Debug, Clone, Deserialize)]
pub struct AckedFilter {
    pub id: i64,
    #[serde(flatten)]
    pub filter: PostgresChangeFilter,
}

/// Extract the acknowledged filters from a join reply payload.
pub fn acked_filters(reply_payload: &Value) -> Vec<AckedFilter> {
    reply_payload
        .pointer("/response/postgres_changes")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Payload of a `postgres_changes` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePayload {
    #[serde(default)]
    pub ids: Vec<i64>,
    pub data: ChangeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeData {
    #[serde(rename = "type")]
    pub kind: ChangeEvent,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
    #[serde(default)]
    pub errors: Option<Value>,
}

/// Payload of a `phx_join` frame.
pub fn join_payload(filters: &[PostgresChangeFilter], access_token: Option<&str>) -> Value {
    let mut payload = json!({
        "config": {
            "broadcast": { "ack": false, "self": false },
            "presence": { "key": "" },
            "postgres_changes": filters,
            "private": false,
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    payload
}

/// Websocket URL of the realtime endpoint for a project URL.
pub fn realtime_url(project_url: &str, anon_key: &str) -> CbResult<String> {
    let base = AppConfig::sanitize_url(project_url);
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(CbError::MissingConfig("backend.url".into()));
    };

    let url = reqwest::Url::parse_with_params(
        &format!("{ws_base}{}", constants::REALTIME_PATH),
        &[("apikey", anon_key), ("vsn", constants::REALTIME_VSN)],
    )
    .map_err(|e| CbError::Config(format!("invalid realtime url: {e}")))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wire_format() {
        let frame = Frame::new("realtime:chat-1", events::JOIN, json!({}))
            .with_ref("1")
            .with_join_ref("1");
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value["ref"], "1");
        assert_eq!(value["join_ref"], "1");
        assert_eq!(value["event"], "phx_join");
    }

    #[test]
    fn test_decode_frame_with_null_refs() {
        let frame = Frame::decode(
            r#"{"topic":"realtime:chat-1","event":"system","payload":{"status":"ok"},"ref":null}"#,
        )
        .unwrap();
        assert!(frame.reference.is_none());
        assert!(frame.join_ref.is_none());
        assert_eq!(frame.reply_status(), Some("ok"));
        assert!(Frame::decode("not json").is_err());
    }

    #[test]
    fn test_join_payload() {
        let filters = vec![PostgresChangeFilter::new(ChangeEvent::Insert, "public", "messages")
            .eq("chat_id", 7)];
        let payload = join_payload(&filters, Some("jwt"));
        assert_eq!(
            payload["config"]["postgres_changes"][0],
            json!({"event": "INSERT", "schema": "public", "table": "messages", "filter": "chat_id=eq.7"})
        );
        assert_eq!(payload["access_token"], "jwt");
        assert!(join_payload(&[], None).get("access_token").is_none());
    }

    #[test]
    fn test_acked_filters() {
        let reply = json!({
            "status": "ok",
            "response": {"postgres_changes": [
                {"id": 101, "event": "INSERT", "schema": "public", "table": "messages", "filter": "chat_id=eq.7"}
            ]}
        });
        let acked = acked_filters(&reply);
        assert_eq!(acked.len(), 1);
        assert_eq!(acked[0].id, 101);
        let ours = PostgresChangeFilter::new(ChangeEvent::Insert, "public", "messages").eq("chat_id", 7);
        assert!(ours.same_as(&acked[0].filter));
    }

    #[test]
    fn test_realtime_url() {
        assert_eq!(
            realtime_url("https://abcdefgh.supabase.co", "anon").unwrap(),
            "wss://abcdefgh.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        assert!(realtime_url("http://127.0.0.1:54321", "k")
            .unwrap()
            .starts_with("ws://127.0.0.1:54321/realtime/v1/websocket"));
        assert!(realtime_url("", "k").is_err());
    }

    #[test]
    fn test_change_event_accepts() {
        assert!(ChangeEvent::All.accepts(ChangeEvent::Delete));
        assert!(ChangeEvent::Insert.accepts(ChangeEvent::Insert));
        assert!(!ChangeEvent::Insert.accepts(ChangeEvent::Update));
    }
}
