//! Realtime channels and change bindings.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use cb_core::error::CbResult;

use crate::client::RealtimeClient;
use crate::protocol::{AckedFilter, ChangeData, ChangeEvent, PostgresChangeFilter};

/// Lifecycle of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Join sent, no reply yet.
    Joining,
    /// The server accepted the join.
    Joined,
    /// The server rejected the join or reported an error.
    Errored,
    /// Left, or the connection dropped.
    Closed,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Joining => write!(f, "joining"),
            Self::Joined => write!(f, "joined"),
            Self::Errored => write!(f, "errored"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A row change delivered to a binding.
#[derive(Debug, Clone)]
pub struct PostgresChange {
    pub kind: ChangeEvent,
    pub schema: String,
    pub table: String,
    pub commit_timestamp: Option<String>,
    /// New row for INSERT and UPDATE; `Null` for DELETE.
    pub record: Value,
    /// Old row for UPDATE and DELETE, as far as the table's replica identity provides it.
    pub old_record: Value,
}

impl PostgresChange {
    /// The row the change is about: the new row, or the old row for DELETE.
    pub fn row(&self) -> &Value {
        match self.kind {
            ChangeEvent::Delete => &self.old_record,
            _ => &self.record,
        }
    }
}

impl From<ChangeData> for PostgresChange {
    fn from(data: ChangeData) -> Self {
        Self {
            kind: data.kind,
            schema: data.schema,
            table: data.table,
            commit_timestamp: data.commit_timestamp,
            record: data.record.unwrap_or(Value::Null),
            old_record: data.old_record.unwrap_or(Value::Null),
        }
    }
}

/// Callback invoked for each matching row change.
pub type ChangeCallback = Arc<dyn Fn(&PostgresChange) + Send + Sync>;

/// One `postgres_changes` listener of a channel.
#[derive(Clone)]
pub(crate) struct Binding {
    pub filter: PostgresChangeFilter,
    /// Id the server assigned in its join reply.
    pub server_id: Option<i64>,
    pub callback: ChangeCallback,
}

impl Binding {
    /// Whether a change frame is meant for this binding.
    ///
    /// Once the server acknowledged the binding its id decides; before
    /// that, the change kind and table are compared.
    pub fn matches(&self, ids: &[i64], data: &ChangeData) -> bool {
        match self.server_id {
            Some(id) if !ids.is_empty() => ids.contains(&id),
            _ => {
                self.filter.event.accepts(data.kind)
                    && self.filter.schema == data.schema
                    && self.filter.table == data.table
            }
        }
    }
}

/// Client-side record of a joined channel.
pub(crate) struct ChannelEntry {
    pub topic: String,
    pub join_ref: String,
    pub state: ChannelState,
    pub bindings: Vec<Binding>,
}

impl ChannelEntry {
    /// Attach the server ids from a join reply to the bindings.
    pub fn apply_ack(&mut self, acked: &[AckedFilter]) {
        for (index, binding) in self.bindings.iter_mut().enumerate() {
            let by_filter = acked.iter().find(|a| binding.filter.same_as(&a.filter));
            let by_position = acked.get(index);
            binding.server_id = by_filter.or(by_position).map(|a| a.id);
        }
        debug!(
            "channel {} acknowledged {} of {} bindings",
            self.topic,
            self.bindings.iter().filter(|b| b.server_id.is_some()).count(),
            self.bindings.len()
        );
    }
}

/// Collects listeners before joining a channel.
pub struct ChannelBuilder {
    client: RealtimeClient,
    name: String,
    bindings: Vec<Binding>,
}

impl ChannelBuilder {
    pub(crate) fn new(client: RealtimeClient, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
            bindings: Vec::new(),
        }
    }

    /// Listen for row changes matching `filter`.
    pub fn on_postgres_changes<F>(mut self, filter: PostgresChangeFilter, callback: F) -> Self
    where
        F: Fn(&PostgresChange) + Send + Sync + 'static,
    {
        self.bindings.push(Binding {
            filter,
            server_id: None,
            callback: Arc::new(callback),
        });
        self
    }

    /// Join the channel, connecting the client first if needed.
    pub async fn subscribe(self) -> CbResult<RealtimeChannel> {
        let client = self.client.clone();
        client.join(&self.name, self.bindings).await
    }
}

/// Handle to a joined channel.
pub struct RealtimeChannel {
    pub(crate) client: RealtimeClient,
    pub(crate) topic: String,
    pub(crate) join_ref: String,
}

impl RealtimeChannel {
    /// Full topic, e.g. `realtime:chat-42`.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn state(&self) -> ChannelState {
        self.client
            .channel_state(&self.join_ref)
            .await
            .unwrap_or(ChannelState::Closed)
    }

    /// Leave the channel and drop its listeners.
    pub async fn unsubscribe(self) -> CbResult<()> {
        self.client.remove_channel(&self.join_ref).await
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("topic", &self.topic)
            .field("join_ref", &self.join_ref)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn binding(event: ChangeEvent) -> Binding {
        Binding {
            filter: PostgresChangeFilter::new(event, "public", "messages").eq("chat_id", 1),
            server_id: None,
            callback: Arc::new(|_| {}),
        }
    }

    fn data(kind: ChangeEvent) -> ChangeData {
        serde_json::from_value(json!({
            "type": kind.as_str(),
            "schema": "public",
            "table": "messages",
            "record": {"id": 1}
        }))
        .unwrap()
    }

    #[test]
    fn test_binding_matches_by_kind_before_ack() {
        let b = binding(ChangeEvent::Insert);
        assert!(b.matches(&[], &data(ChangeEvent::Insert)));
        assert!(!b.matches(&[], &data(ChangeEvent::Delete)));
    }

    #[test]
    fn test_binding_matches_by_id_after_ack() {
        let mut entry = ChannelEntry {
            topic: "realtime:chat-1".into(),
            join_ref: "1".into(),
            state: ChannelState::Joining,
            bindings: vec![binding(ChangeEvent::Insert), binding(ChangeEvent::Delete)],
        };
        let acked: Vec<AckedFilter> = serde_json::from_value(json!([
            {"id": 20, "event": "DELETE", "schema": "public", "table": "messages", "filter": "chat_id=eq.1"},
            {"id": 10, "event": "INSERT", "schema": "public", "table": "messages", "filter": "chat_id=eq.1"}
        ]))
        .unwrap();
        entry.apply_ack(&acked);
        assert_eq!(entry.bindings[0].server_id, Some(10));
        assert_eq!(entry.bindings[1].server_id, Some(20));
        assert!(entry.bindings[1].matches(&[20], &data(ChangeEvent::Delete)));
        assert!(!entry.bindings[0].matches(&[20], &data(ChangeEvent::Delete)));
    }

    #[test]
    fn test_change_row_for_delete_is_old_record() {
        let change = PostgresChange {
            kind: ChangeEvent::Delete,
            schema: "public".into(),
            table: "messages".into(),
            commit_timestamp: None,
            record: Value::Null,
            old_record: json!({"id": 3}),
        };
        assert_eq!(change.row()["id"], 3);
    }
}
