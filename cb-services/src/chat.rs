//! Chat service.
//!
//! Reads and writes the `chats`, `chat_members`, `messages`, and `users`
//! tables, and opens one realtime channel per subscribed chat. Failures
//! are logged and returned unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cb_api::{insert_as, select_as, select_single_as, TableApi, TableQuery};
use cb_core::constants::{self, tables};
use cb_core::error::{CbError, CbResult};
use cb_models::{Chat, ChatMember, Message, NewChat, NewMessage, Profile, RowId, User};
use cb_realtime::{ChangeEvent, PostgresChange, PostgresChangeFilter, RealtimeChannel, RealtimeClient};

use crate::event_bus::{AppEvent, EventBus};
use crate::service::{Service, ServiceState, StateCell};

/// A message change delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct MessageChange {
    pub kind: ChangeEvent,
    /// The new row for INSERT and UPDATE, the old row for DELETE.
    pub message: Message,
}

/// Live subscription to one chat's messages.
#[derive(Debug)]
pub struct MessageSubscription {
    chat_id: RowId,
    channel: RealtimeChannel,
}

impl MessageSubscription {
    pub fn chat_id(&self) -> &RowId {
        &self.chat_id
    }

    pub fn topic(&self) -> &str {
        self.channel.topic()
    }

    /// Remove the channel. No callbacks run afterwards.
    pub async fn unsubscribe(self) -> CbResult<()> {
        debug!("unsubscribing from chat {}", self.chat_id);
        self.channel.unsubscribe().await
    }
}

/// Service for chat lookup, creation, and messaging.
pub struct ChatService {
    tables: Arc<dyn TableApi>,
    realtime: RealtimeClient,
    event_bus: EventBus,
    state: StateCell,
}

#[derive(serde::Deserialize)]
struct ChatIdRow {
    chat_id: RowId,
}

#[derive(serde::Deserialize)]
struct UserIdRow {
    user_id: Uuid,
}

#[derive(serde::Deserialize)]
struct IdRow {
    id: RowId,
}

impl ChatService {
    pub fn new(tables: Arc<dyn TableApi>, realtime: RealtimeClient, event_bus: EventBus) -> Self {
        Self {
            tables,
            realtime,
            event_bus,
            state: StateCell::new(),
        }
    }

    /// Fetch exactly one chat row.
    pub async fn get_chat_by_id(&self, chat_id: &RowId) -> CbResult<Chat> {
        let query = TableQuery::from(tables::CHATS).eq("id", chat_id);
        select_single_as(self.tables.as_ref(), &query)
            .await
            .inspect_err(|e| error!("failed to fetch chat {chat_id}: {e}"))
    }

    /// Create a private chat with both users as members; returns its id.
    ///
    /// If adding the members fails the chat row is deleted again and the
    /// member error is returned.
    pub async fn create_chat(&self, current_user: &User, selected_user: &Profile) -> CbResult<RowId> {
        let created: Vec<IdRow> = insert_as(
            self.tables.as_ref(),
            tables::CHATS,
            &NewChat::private(current_user.id),
            "id",
        )
        .await
        .inspect_err(|e| error!("failed to create chat: {e}"))?;

        let chat_id = created
            .into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| CbError::Internal("chat insert returned no row".into()))?;

        let members = [
            ChatMember::admin(chat_id.clone(), current_user.id),
            ChatMember::member(chat_id.clone(), selected_user.id),
        ];
        let members_value = serde_json::to_value(&members)?;
        if let Err(e) = self.tables.insert(tables::CHAT_MEMBERS, &members_value, None).await {
            error!("failed to add members to chat {chat_id}: {e}");
            let cleanup = TableQuery::from(tables::CHATS).eq("id", &chat_id);
            if let Err(cleanup_err) = self.tables.delete(&cleanup).await {
                error!("failed to remove orphaned chat {chat_id}: {cleanup_err}");
            } else {
                warn!("removed chat {chat_id} after member insert failed");
            }
            return Err(e);
        }

        info!("created chat {chat_id} between {} and {}", current_user.id, selected_user.id);
        self.event_bus.emit(AppEvent::ChatCreated {
            chat_id: chat_id.clone(),
            created_by: current_user.id,
            member_id: selected_user.id,
        });
        Ok(chat_id)
    }

    /// Id of a chat both users are members of, if any.
    pub async fn get_chat(&self, current_user: &User, selected_user: &Profile) -> CbResult<Option<RowId>> {
        let own_query = TableQuery::from(tables::CHAT_MEMBERS)
            .select("chat_id")
            .eq("user_id", current_user.id);
        let own: Vec<ChatIdRow> = select_as(self.tables.as_ref(), &own_query)
            .await
            .inspect_err(|e| error!("failed to fetch chats of {}: {e}", current_user.id))?;

        if own.is_empty() {
            return Ok(None);
        }

        let shared_query = TableQuery::from(tables::CHAT_MEMBERS)
            .select("chat_id")
            .eq("user_id", selected_user.id)
            .in_list("chat_id", own.iter().map(|row| &row.chat_id));
        let shared: Vec<ChatIdRow> = select_as(self.tables.as_ref(), &shared_query)
            .await
            .inspect_err(|e| error!("failed to fetch chats of {}: {e}", selected_user.id))?;

        Ok(shared.into_iter().next().map(|row| row.chat_id))
    }

    /// Existing shared chat, or a new one.
    ///
    /// Lookup and creation are separate requests: two concurrent callers
    /// can both create a chat for the same pair.
    pub async fn get_or_create_chat(&self, current_user: &User, selected_user: &Profile) -> CbResult<RowId> {
        if let Some(existing) = self.get_chat(current_user, selected_user).await? {
            debug!("reusing chat {existing}");
            return Ok(existing);
        }
        self.create_chat(current_user, selected_user).await
    }

    /// User ids of every member of a chat.
    pub async fn get_chat_members(&self, chat_id: &RowId) -> CbResult<Vec<Uuid>> {
        let query = TableQuery::from(tables::CHAT_MEMBERS)
            .select("user_id")
            .eq("chat_id", chat_id);
        let rows: Vec<UserIdRow> = select_as(self.tables.as_ref(), &query)
            .await
            .inspect_err(|e| error!("failed to fetch members of chat {chat_id}: {e}"))?;
        Ok(rows.into_iter().map(|row| row.user_id).collect())
    }

    /// Public profile of a user.
    pub async fn get_chat_user(&self, user_id: &Uuid) -> CbResult<Profile> {
        let query = TableQuery::from(tables::USERS).eq("id", user_id);
        select_single_as(self.tables.as_ref(), &query)
            .await
            .inspect_err(|e| error!("failed to fetch profile {user_id}: {e}"))
    }

    /// Messages of a chat, oldest first.
    pub async fn get_messages_by_chat_id(&self, chat_id: &RowId) -> CbResult<Vec<Message>> {
        let query = TableQuery::from(tables::MESSAGES)
            .eq("chat_id", chat_id)
            .order("created_at", true);
        select_as(self.tables.as_ref(), &query)
            .await
            .inspect_err(|e| error!("failed to fetch messages of chat {chat_id}: {e}"))
    }

    /// Insert a message and return the stored row.
    pub async fn send_chat_message(&self, chat_id: &RowId, user_id: &Uuid, content: &str) -> CbResult<Message> {
        let row = NewMessage { chat_id, user_id, content };
        let inserted: Vec<Message> = insert_as(self.tables.as_ref(), tables::MESSAGES, &row, "*")
            .await
            .inspect_err(|e| error!("failed to send message to chat {chat_id}: {e}"))?;

        let message = inserted
            .into_iter()
            .next()
            .ok_or_else(|| CbError::Internal("message insert returned no row".into()))?;

        self.event_bus.emit(AppEvent::MessageSent {
            chat_id: chat_id.clone(),
            message_id: message.id.clone(),
        });
        Ok(message)
    }

    /// Listen for inserted, updated, and deleted messages of a chat.
    ///
    /// Each subscription opens its own channel; subscribing twice to the
    /// same chat delivers every change twice.
    pub async fn subscribe_to_messages<F>(&self, chat_id: &RowId, callback: F) -> CbResult<MessageSubscription>
    where
        F: Fn(MessageChange) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let mut builder = self.realtime.channel(&constants::chat_channel_name(chat_id.as_str()));

        for kind in [ChangeEvent::Insert, ChangeEvent::Delete, ChangeEvent::Update] {
            let filter = PostgresChangeFilter::new(kind, constants::DEFAULT_SCHEMA, tables::MESSAGES)
                .eq("chat_id", chat_id);
            let callback = callback.clone();
            let bus = self.event_bus.clone();
            let chat = chat_id.clone();
            builder = builder.on_postgres_changes(filter, move |change: &PostgresChange| {
                let message: Message = match serde_json::from_value(change.row().clone()) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("undecodable {} on chat {chat}: {e}", change.kind);
                        return;
                    }
                };
                bus.emit(AppEvent::MessageChanged {
                    chat_id: chat.clone(),
                    kind: change.kind,
                    message_id: message.id.clone(),
                });
                (*callback)(MessageChange { kind: change.kind, message });
            });
        }

        let channel = builder
            .subscribe()
            .await
            .inspect_err(|e| error!("failed to subscribe to chat {chat_id}: {e}"))?;
        info!("subscribed to messages of chat {chat_id}");

        Ok(MessageSubscription {
            chat_id: chat_id.clone(),
            channel,
        })
    }
}

#[async_trait]
impl Service for ChatService {
    fn name(&self) -> &str {
        "chat"
    }

    fn state(&self) -> ServiceState {
        self.state.get()
    }

    async fn init(&self) -> CbResult<()> {
        self.state.set(ServiceState::Running);
        Ok(())
    }

    async fn shutdown(&self) -> CbResult<()> {
        self.realtime.disconnect().await;
        self.state.set(ServiceState::Stopped);
        Ok(())
    }
}
