//! Auth endpoints.

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

use cb_core::error::CbResult;
use cb_models::{Session, SignUpOutcome, User};

use crate::client::ApiClient;
use crate::response::ErrorSource;

/// Body of a sign-up request.
#[derive(Debug, Clone, Serialize)]
pub struct SignUpParams<'a> {
    pub email: &'a str,
    pub password: &'a str,
    /// Initial user metadata.
    pub data: &'a Value,
}

impl ApiClient {
    /// Create an account. Returns a session when the project auto-confirms
    /// sign-ups, otherwise the unconfirmed user.
    pub async fn sign_up(
        &self,
        params: &SignUpParams<'_>,
        redirect_to: Option<&str>,
    ) -> CbResult<SignUpOutcome> {
        let mut builder = self
            .auth_request(Method::POST, "/signup", None)
            .await
            .json(params);
        if let Some(redirect) = redirect_to {
            builder = builder.query(&[("redirect_to", redirect)]);
        }

        let body = self.send_json(builder, ErrorSource::Auth).await?;
        decode_sign_up(body)
    }

    /// Exchange an email and password for a session.
    pub async fn token_with_password(&self, email: &str, password: &str) -> CbResult<Session> {
        let builder = self
            .auth_request(Method::POST, "/token", None)
            .await
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let body = self.send_json(builder, ErrorSource::Auth).await?;
        Ok(serde_json::from_value::<Session>(body)?.with_computed_expiry())
    }

    /// Exchange a refresh token for a new session.
    pub async fn token_with_refresh(&self, refresh_token: &str) -> CbResult<Session> {
        let builder = self
            .auth_request(Method::POST, "/token", None)
            .await
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));

        let body = self.send_json(builder, ErrorSource::Auth).await?;
        Ok(serde_json::from_value::<Session>(body)?.with_computed_expiry())
    }

    /// Fetch the user owning `access_token`.
    pub async fn fetch_user(&self, access_token: &str) -> CbResult<User> {
        let builder = self
            .auth_request(Method::GET, "/user", Some(access_token))
            .await;
        let body = self.send_json(builder, ErrorSource::Auth).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Merge `data` into the user's metadata.
    pub async fn put_user_data(&self, access_token: &str, data: &Value) -> CbResult<User> {
        let builder = self
            .auth_request(Method::PUT, "/user", Some(access_token))
            .await
            .json(&json!({ "data": data }));
        let body = self.send_json(builder, ErrorSource::Auth).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Revoke the session owning `access_token`.
    pub async fn logout(&self, access_token: &str) -> CbResult<()> {
        let builder = self
            .auth_request(Method::POST, "/logout", Some(access_token))
            .await;
        self.send(builder, ErrorSource::Auth).await?;
        Ok(())
    }

    /// Provider authorization URL for an OAuth sign-in.
    pub fn oauth_authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String {
        let mut params = vec![("provider", provider)];
        if let Some(redirect) = redirect_to {
            params.push(("redirect_to", redirect));
        }
        let base = self.auth_url("/authorize");
        match reqwest::Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{base}?provider={provider}"),
        }
    }
}

/// A sign-up response is either a full session or a bare user.
fn decode_sign_up(body: Value) -> CbResult<SignUpOutcome> {
    if body.get("access_token").is_some() {
        let session: Session = serde_json::from_value(body)?;
        return Ok(SignUpOutcome::Session(session.with_computed_expiry()));
    }
    // Some servers nest the user: {"user": {...}, "session": null}
    let user_value = match body.get("user") {
        Some(user) if user.is_object() => user.clone(),
        _ => body,
    };
    Ok(SignUpOutcome::ConfirmationRequired(serde_json::from_value(user_value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::config::BackendConfig;
    use cb_core::token::AccessToken;

    const USER_ID: &str = "3f0b6a2e-9a43-4d6c-9c1e-5d3f4b0a1c2d";

    #[test]
    fn test_decode_sign_up_session() {
        let outcome = decode_sign_up(json!({
            "access_token": "jwt",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": {"id": USER_ID, "email": "ann@example.com"}
        }))
        .unwrap();
        match outcome {
            SignUpOutcome::Session(s) => assert!(s.expires_at.is_some()),
            other => panic!("expected session, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_sign_up_unconfirmed() {
        let outcome = decode_sign_up(json!({"id": USER_ID, "email": "ann@example.com"})).unwrap();
        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(_)));

        let nested = decode_sign_up(json!({"user": {"id": USER_ID}, "session": null})).unwrap();
        assert_eq!(nested.user().id.to_string(), USER_ID);
    }

    #[test]
    fn test_oauth_authorize_url() {
        let config = BackendConfig {
            url: "https://abcdefgh.supabase.co".into(),
            anon_key: "anon".into(),
            ..Default::default()
        };
        let client = ApiClient::new(&config, AccessToken::new()).unwrap();
        assert_eq!(
            client.oauth_authorize_url("github", None),
            "https://abcdefgh.supabase.co/auth/v1/authorize?provider=github"
        );
        assert!(client
            .oauth_authorize_url("github", Some("http://localhost:5173/"))
            .contains("redirect_to=http%3A%2F%2Flocalhost%3A5173%2F"));
    }
}
