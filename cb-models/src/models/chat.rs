//! Chat (conversation) entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::row_id::RowId;

/// Kind of chat. Only one-to-one chats exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Private => "private",
        }
    }
}

/// A row of the `chats` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: RowId,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub created_by: Uuid,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new chat row.
#[derive(Debug, Clone, Serialize)]
pub struct NewChat {
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub created_by: Uuid,
}

impl NewChat {
    pub fn private(created_by: Uuid) -> Self {
        Self {
            chat_type: ChatType::Private,
            created_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_from_json() {
        let chat: Chat = serde_json::from_value(json!({
            "id": 12,
            "type": "private",
            "created_by": "3f0b6a2e-9a43-4d6c-9c1e-5d3f4b0a1c2d",
            "created_at": "2024-05-01T10:00:00.123456+00:00"
        }))
        .unwrap();
        assert_eq!(chat.id.as_str(), "12");
        assert_eq!(chat.chat_type, ChatType::Private);
        assert!(chat.created_at.is_some());
    }

    #[test]
    fn test_new_chat_payload() {
        let id = Uuid::parse_str("3f0b6a2e-9a43-4d6c-9c1e-5d3f4b0a1c2d").unwrap();
        assert_eq!(
            serde_json::to_value(NewChat::private(id)).unwrap(),
            json!({"type": "private", "created_by": "3f0b6a2e-9a43-4d6c-9c1e-5d3f4b0a1c2d"})
        );
    }
}
