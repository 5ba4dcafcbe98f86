//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Chatbase";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path prefix of the auth endpoint.
pub const AUTH_PATH: &str = "/auth/v1";

/// Path prefix of the table endpoint.
pub const REST_PATH: &str = "/rest/v1";

/// Path of the realtime websocket endpoint.
pub const REALTIME_PATH: &str = "/realtime/v1/websocket";

/// Realtime protocol version sent as the `vsn` query parameter.
pub const REALTIME_VSN: &str = "1.0.0";

/// Default API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Default realtime heartbeat interval in milliseconds.
pub const REALTIME_HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Default database schema.
pub const DEFAULT_SCHEMA: &str = "public";

/// Default OAuth provider.
pub const DEFAULT_OAUTH_PROVIDER: &str = "github";

/// Query string appended to the site URL for sign-up confirmation links.
pub const EMAIL_CONFIRMATION_QUERY: &str = "fromEmail=registrationConfirmation";

/// Sessions this close to expiry are treated as expired.
pub const SESSION_EXPIRY_MARGIN_SECS: i64 = 30;

/// Remote table names.
pub mod tables {
    pub const CHATS: &str = "chats";
    pub const CHAT_MEMBERS: &str = "chat_members";
    pub const MESSAGES: &str = "messages";
    pub const USERS: &str = "users";
}

/// Prefix of the realtime channel opened per chat.
pub const CHAT_CHANNEL_PREFIX: &str = "chat-";

/// Realtime channel name for a chat.
pub fn chat_channel_name(chat_id: &str) -> String {
    format!("{CHAT_CHANNEL_PREFIX}{chat_id}")
}
