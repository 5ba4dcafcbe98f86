//! Auth service integration tests.
//!
//! Sign-up, sign-in, profile updates, sign-out, session restore, and the
//! session handle fed by the context's auth listener.

mod common;

use std::time::Duration;

use cb_core::error::CbError;
use cb_models::{ProfileUpdate, SignUpOutcome};
use cb_services::event_bus::AppEvent;
use cb_services::{AuthChangeEvent, SessionStore};
use tempfile::TempDir;

use common::FakeBackend;

// ---- Sign-up and sign-in ----

#[tokio::test]
async fn sign_up_then_sign_in_yields_same_user() {
    let backend = FakeBackend::new();
    let (ctx, _frames) = common::started_context(backend).await;

    let outcome = ctx.auth().sign_up("alice", "alice@example.com", "hunter22").await.unwrap();
    let signed_up = outcome.user().clone();
    assert_eq!(signed_up.user_metadata.full_name.as_deref(), Some("alice"));
    assert_eq!(signed_up.user_metadata.avatar_url.as_deref(), Some(""));
    assert!(ctx.session().wait_for(true).await.is_some());

    ctx.auth().sign_out().await.unwrap();
    ctx.session().wait_for(false).await;

    let session = ctx
        .auth()
        .sign_in_with_password("alice@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(session.user.id, signed_up.id);
    let current = ctx.session().wait_for(true).await.unwrap();
    assert_eq!(current.user.id, signed_up.id);
}

#[tokio::test]
async fn sign_up_awaiting_confirmation_does_not_sign_in() {
    let backend = FakeBackend::requiring_confirmation();
    let (ctx, _frames) = common::started_context(backend).await;

    let outcome = ctx.auth().sign_up("bob", "bob@example.com", "password1").await.unwrap();
    assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(_)));
    assert!(!ctx.session().is_logged_in());
    assert!(ctx.auth().current_session().await.is_none());
}

#[tokio::test]
async fn duplicate_sign_up_returns_backend_error() {
    let backend = FakeBackend::new();
    backend.add_user("carol", "carol@example.com", "password1");
    let (ctx, _frames) = common::started_context(backend).await;

    let err = ctx
        .auth()
        .sign_up("carol", "carol@example.com", "password1")
        .await
        .unwrap_err();
    let remote = err.remote().expect("remote error");
    assert_eq!(remote.status, 422);
    assert_eq!(remote.code.as_deref(), Some("user_already_exists"));
}

#[tokio::test]
async fn wrong_password_is_rejected_unchanged() {
    let backend = FakeBackend::new();
    backend.add_user("dave", "dave@example.com", "password1");
    let (ctx, _frames) = common::started_context(backend).await;

    let err = ctx
        .auth()
        .sign_in_with_password("dave@example.com", "nope")
        .await
        .unwrap_err();
    match err {
        CbError::Auth(remote) => {
            assert_eq!(remote.status, 400);
            assert_eq!(remote.message, "Invalid login credentials");
        }
        other => panic!("expected auth error, got {other:?}"),
    }
    assert!(!ctx.session().is_logged_in());
}

#[tokio::test]
async fn email_redirect_points_at_confirmation_query() {
    let (ctx, _frames) = common::started_context(FakeBackend::new()).await;
    assert_eq!(
        ctx.auth().email_redirect_url(),
        "http://localhost:5173/?fromEmail=registrationConfirmation"
    );
}

#[tokio::test]
async fn oauth_defaults_to_github() {
    let (ctx, _frames) = common::started_context(FakeBackend::new()).await;
    let url = ctx.auth().sign_in_with_oauth(None).unwrap();
    assert!(url.contains("provider=github"));
    let url = ctx.auth().sign_in_with_oauth(Some("gitlab")).unwrap();
    assert!(url.contains("provider=gitlab"));
}

// ---- Profile updates ----

#[tokio::test]
async fn update_user_without_session_is_not_authenticated() {
    let (ctx, _frames) = common::started_context(FakeBackend::new()).await;
    let err = ctx
        .auth()
        .update_user(&ProfileUpdate::default().full_name("nobody"))
        .await
        .unwrap_err();
    assert!(matches!(err, CbError::NotAuthenticated));
}

#[tokio::test]
async fn update_user_changes_metadata_and_emits_event() {
    let backend = FakeBackend::new();
    backend.add_user("erin", "erin@example.com", "password1");
    let (ctx, _frames) = common::started_context(backend).await;
    ctx.auth().sign_in_with_password("erin@example.com", "password1").await.unwrap();
    ctx.session().wait_for(true).await;

    let mut events = ctx.event_bus().subscribe();
    let user = ctx
        .auth()
        .update_user(&ProfileUpdate::default().full_name("Erin E.").avatar_url("https://img/e.png"))
        .await
        .unwrap();
    assert_eq!(user.user_metadata.full_name.as_deref(), Some("Erin E."));

    let updated_for = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let AppEvent::AuthStateChanged {
                event: AuthChangeEvent::UserUpdated,
                user_id,
            } = events.recv().await.unwrap()
            {
                return user_id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(updated_for, Some(user.id));

    let session = ctx.session().current().unwrap();
    assert_eq!(session.user.user_metadata.avatar_url.as_deref(), Some("https://img/e.png"));
}

// ---- Sign-out ----

#[tokio::test]
async fn sign_out_clears_session_even_when_remote_fails() {
    let backend = FakeBackend::new();
    backend.add_user("frank", "frank@example.com", "password1");
    let (ctx, _frames) = common::started_context(backend.clone()).await;
    ctx.auth().sign_in_with_password("frank@example.com", "password1").await.unwrap();
    ctx.session().wait_for(true).await;

    backend.fail_sign_out();
    assert!(ctx.auth().sign_out().await.is_err());
    ctx.session().wait_for(false).await;
    assert!(ctx.auth().current_session().await.is_none());
}

// ---- Session restore ----

#[tokio::test]
async fn persisted_session_is_restored_on_start() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new();
    let user = backend.add_user("gina", "gina@example.com", "password1");

    {
        let store = SessionStore::new(dir.path().join("session.json"));
        let (ctx, _frames) = common::create_test_context(backend.clone(), Some(store));
        ctx.start().await.unwrap();
        assert!(!ctx.session().is_logged_in());
        ctx.auth().sign_in_with_password("gina@example.com", "password1").await.unwrap();
        ctx.session().wait_for(true).await;
        ctx.shutdown().await.unwrap();
    }

    let store = SessionStore::new(dir.path().join("session.json"));
    let (ctx, _frames) = common::create_test_context(backend, Some(store));
    ctx.start().await.unwrap();
    assert!(ctx.is_ready());
    assert_eq!(ctx.session().user().unwrap().id, user.id);
}

#[tokio::test]
async fn expired_session_is_refreshed_on_start() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new();
    backend.add_user("hank", "hank@example.com", "password1");
    let expired = backend.expired_session("hank@example.com");

    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&expired).unwrap();

    let (ctx, _frames) = common::create_test_context(backend, Some(store.clone()));
    ctx.start().await.unwrap();

    let restored = ctx.session().current().expect("refreshed session");
    assert_ne!(restored.access_token, expired.access_token);
    assert!(!restored.is_expired());
    assert_eq!(store.load().unwrap().unwrap().access_token, restored.access_token);
}

#[tokio::test]
async fn unrefreshable_session_is_dropped() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new();
    backend.add_user("ivy", "ivy@example.com", "password1");
    let mut expired = backend.expired_session("ivy@example.com");
    expired.refresh_token = "revoked".to_string();

    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&expired).unwrap();

    let (ctx, _frames) = common::create_test_context(backend, Some(store.clone()));
    ctx.start().await.unwrap();
    assert!(!ctx.session().is_logged_in());
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn rejected_live_session_is_refreshed_on_start() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new();
    let user = backend.add_user("jade", "jade@example.com", "password1");
    let stale = backend.revoked_access_session("jade@example.com");
    assert!(!stale.is_expired());

    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&stale).unwrap();

    let (ctx, _frames) = common::create_test_context(backend, Some(store.clone()));
    ctx.start().await.unwrap();

    let restored = ctx.session().current().expect("refreshed session");
    assert_ne!(restored.access_token, stale.access_token);
    assert_eq!(restored.user.id, user.id);
    assert_eq!(store.load().unwrap().unwrap().access_token, restored.access_token);
}

#[tokio::test]
async fn rejected_live_session_without_refresh_is_dropped() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new();
    backend.add_user("kim", "kim@example.com", "password1");
    let mut stale = backend.revoked_access_session("kim@example.com");
    stale.refresh_token = "revoked".to_string();

    let store = SessionStore::new(dir.path().join("session.json"));
    store.save(&stale).unwrap();

    let (ctx, _frames) = common::create_test_context(backend, Some(store.clone()));
    ctx.start().await.unwrap();
    assert!(!ctx.session().is_logged_in());
    assert!(store.load().unwrap().is_none());
}
