//! Chatbase Realtime - Websocket client for database change notifications.
//!
//! Speaks the Phoenix channel protocol used by the hosted realtime server:
//! channels are joined with a list of `postgres_changes` filters, the server
//! acknowledges with per-filter ids, and matching row changes arrive as
//! `postgres_changes` frames. One websocket multiplexes every channel.
//! The connection is opened lazily on first subscription and is not
//! re-established automatically when it drops.

pub mod channel;
pub mod client;
pub mod protocol;

pub use channel::{ChangeCallback, ChannelBuilder, ChannelState, PostgresChange, RealtimeChannel};
pub use client::{ConnectionState, RealtimeClient};
pub use protocol::{ChangeEvent, Frame, PostgresChangeFilter};
