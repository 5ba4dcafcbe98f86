//! Message entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::row_id::RowId;

/// A row of the `messages` table.
///
/// Every field has a default: realtime DELETE events may carry only the
/// primary key of the removed row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: RowId,
    pub chat_id: RowId,
    pub user_id: Option<Uuid>,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Whether `user_id` wrote this message.
    pub fn is_from(&self, user_id: &Uuid) -> bool {
        self.user_id.as_ref() == Some(user_id)
    }
}

/// Insert payload for a new message.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage<'a> {
    pub chat_id: &'a RowId,
    pub user_id: &'a Uuid,
    pub content: &'a str,
}
