//! Chat membership rows.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::row_id::RowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

/// A row of the `chat_members` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMember {
    pub chat_id: RowId,
    pub user_id: Uuid,
    pub role: MemberRole,
}

impl ChatMember {
    pub fn admin(chat_id: RowId, user_id: Uuid) -> Self {
        Self { chat_id, user_id, role: MemberRole::Admin }
    }

    pub fn member(chat_id: RowId, user_id: Uuid) -> Self {
        Self { chat_id, user_id, role: MemberRole::Member }
    }
}
