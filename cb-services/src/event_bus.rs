//! Typed event bus for intra-service communication.
//!
//! Uses a tokio broadcast channel so services can announce state changes
//! without knowing who is listening.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use cb_models::RowId;
use cb_realtime::ChangeEvent;

use crate::auth::AuthChangeEvent;

/// All application-level event types that flow through the event bus.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The signed-in user changed (sign in, sign out, refresh, restore, update).
    AuthStateChanged {
        event: AuthChangeEvent,
        user_id: Option<Uuid>,
    },
    /// A private chat and its two member rows were created.
    ChatCreated {
        chat_id: RowId,
        created_by: Uuid,
        member_id: Uuid,
    },
    /// A message was inserted by this client.
    MessageSent {
        chat_id: RowId,
        message_id: RowId,
    },
    /// A realtime change arrived for a subscribed chat.
    MessageChanged {
        chat_id: RowId,
        kind: ChangeEvent,
        message_id: RowId,
    },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Every subscriber gets every event. Subscribers that fall behind receive
/// a `Lagged` error and miss events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to receive application events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("event_bus: emitted {label} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("event_bus: no subscribers for {label}");
            }
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Human-readable label for an event (for logging).
fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::AuthStateChanged { .. } => "AuthStateChanged",
        AppEvent::ChatCreated { .. } => "ChatCreated",
        AppEvent::MessageSent { .. } => "MessageSent",
        AppEvent::MessageChanged { .. } => "MessageChanged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(AppEvent::MessageSent {
            chat_id: RowId::from(1),
            message_id: RowId::from(9),
        });

        match rx.recv().await.unwrap() {
            AppEvent::MessageSent { chat_id, message_id } => {
                assert_eq!(chat_id.as_str(), "1");
                assert_eq!(message_id.as_str(), "9");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(AppEvent::AuthStateChanged {
            event: AuthChangeEvent::SignedOut,
            user_id: None,
        });

        assert!(matches!(rx1.recv().await.unwrap(), AppEvent::AuthStateChanged { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), AppEvent::AuthStateChanged { .. }));
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::default();
        bus.emit(AppEvent::MessageChanged {
            chat_id: RowId::from(1),
            kind: ChangeEvent::Delete,
            message_id: RowId::from(2),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
