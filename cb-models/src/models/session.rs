//! Auth session model.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use cb_core::constants::SESSION_EXPIRY_MARGIN_SECS;

use super::user::User;

/// A signed-in session issued by the auth endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: i64,
    /// Expiry as unix seconds. Filled from `expires_in` when the backend omits it.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Fill `expires_at` from `expires_in` relative to now, if missing.
    pub fn with_computed_expiry(mut self) -> Self {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }

    /// Whether the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Expiry check against an explicit clock, in unix seconds.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(at) => at - SESSION_EXPIRY_MARGIN_SECS <= now,
            None => false,
        }
    }
}

/// Result of a sign-up call.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// The account was confirmed immediately and a session issued.
    Session(Session),
    /// The account must be confirmed by email before signing in.
    ConfirmationRequired(User),
}

impl SignUpOutcome {
    pub fn user(&self) -> &User {
        match self {
            SignUpOutcome::Session(s) => &s.user,
            SignUpOutcome::ConfirmationRequired(u) => u,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_json() -> serde_json::Value {
        json!({
            "access_token": "jwt",
            "refresh_token": "r1",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {"id": "3f0b6a2e-9a43-4d6c-9c1e-5d3f4b0a1c2d", "email": "ann@example.com"}
        })
    }

    #[test]
    fn test_session_computes_expiry() {
        let session: Session = serde_json::from_value(session_json()).unwrap();
        assert!(session.expires_at.is_none());
        assert!(!session.is_expired());

        let session = session.with_computed_expiry();
        let at = session.expires_at.unwrap();
        assert!(at > Utc::now().timestamp());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_session_expiry_margin() {
        let mut session: Session = serde_json::from_value(session_json()).unwrap();
        session.expires_at = Some(1_000);
        assert!(session.is_expired_at(1_000));
        assert!(session.is_expired_at(980));
        assert!(!session.is_expired_at(900));
    }
}
