//! Auth user model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A user account as returned by the auth endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Set once the email address is confirmed.
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

/// Free-form profile metadata stored on the auth user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Any other keys the backend returns.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Name to show for this user: the profile name, else the email, else the id.
    pub fn display_name(&self) -> String {
        self.user_metadata
            .full_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(String::from)
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.to_string())
    }

    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_from_json() {
        let user: User = serde_json::from_value(json!({
            "id": "3f0b6a2e-9a43-4d6c-9c1e-5d3f4b0a1c2d",
            "aud": "authenticated",
            "email": "ann@example.com",
            "user_metadata": {"full_name": "ann", "avatar_url": "", "theme": "dark"},
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(user.email.as_deref(), Some("ann@example.com"));
        assert_eq!(user.user_metadata.full_name.as_deref(), Some("ann"));
        assert_eq!(user.user_metadata.extra.get("theme"), Some(&json!("dark")));
        assert!(!user.is_confirmed());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user: User = serde_json::from_value(json!({
            "id": "3f0b6a2e-9a43-4d6c-9c1e-5d3f4b0a1c2d",
            "email": "ann@example.com",
            "user_metadata": {"full_name": ""}
        }))
        .unwrap();
        assert_eq!(user.display_name(), "ann@example.com");

        user.email = None;
        assert_eq!(user.display_name(), "3f0b6a2e-9a43-4d6c-9c1e-5d3f4b0a1c2d");
    }
}
