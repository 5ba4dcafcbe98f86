//! Shared test utilities for integration tests.
//!
//! `FakeBackend` keeps users and table rows in memory and answers the auth
//! and table traits the way the hosted backend does, including its error
//! shapes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use cb_api::{AuthApi, TableApi, TableQuery};
use cb_core::config::AppConfig;
use cb_core::error::{CbError, CbResult, RemoteError};
use cb_core::token::AccessToken;
use cb_models::{Session, SignUpOutcome, User, UserMetadata};
use cb_realtime::RealtimeClient;
use cb_services::{AppContext, Backends, SessionStore};

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    /// access token -> email
    access: HashMap<String, String>,
    /// refresh token -> email
    refresh: HashMap<String, String>,
    tables: HashMap<String, Vec<Value>>,
    fail_inserts_into: Option<String>,
    fail_sign_out: bool,
}

/// In-memory auth and table backend.
pub struct FakeBackend {
    state: Mutex<State>,
    counter: AtomicU64,
    /// Sign-up returns a session instead of waiting for email confirmation.
    pub autoconfirm: bool,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            counter: AtomicU64::new(1),
            autoconfirm: true,
        })
    }

    pub fn requiring_confirmation() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            counter: AtomicU64::new(1),
            autoconfirm: false,
        })
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Make every insert into `table` fail with a table error.
    pub fn fail_inserts_into(&self, table: &str) {
        self.state.lock().unwrap().fail_inserts_into = Some(table.to_string());
    }

    pub fn fail_sign_out(&self) {
        self.state.lock().unwrap().fail_sign_out = true;
    }

    /// Rows currently stored in `table`.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Store a row as-is.
    pub fn seed(&self, table: &str, row: Value) {
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Create a confirmed account with a public profile row.
    pub fn add_user(&self, name: &str, email: &str, password: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: UserMetadata {
                full_name: Some(name.to_string()),
                avatar_url: Some(String::new()),
                extra: Map::new(),
            },
            created_at: Some(Utc::now()),
            updated_at: None,
            email_confirmed_at: Some(Utc::now()),
        };
        self.seed(
            "users",
            json!({ "id": user.id, "full_name": name, "avatar_url": "", "email": email }),
        );
        self.state.lock().unwrap().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Issue an expired session for an existing account.
    pub fn expired_session(&self, email: &str) -> Session {
        let mut session = self.issue_session(email);
        session.expires_at = Some(Utc::now().timestamp() - 60);
        session
    }

    /// Issue a live session whose access token the server no longer accepts.
    pub fn revoked_access_session(&self, email: &str) -> Session {
        let session = self.issue_session(email);
        self.state.lock().unwrap().access.remove(&session.access_token);
        session
    }

    fn issue_session(&self, email: &str) -> Session {
        let n = self.next();
        let access_token = format!("access-{n}");
        let refresh_token = format!("refresh-{n}");
        let mut state = self.state.lock().unwrap();
        let user = state.accounts[email].user.clone();
        state.access.insert(access_token.clone(), email.to_string());
        state.refresh.insert(refresh_token.clone(), email.to_string());
        Session {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at: Some(Utc::now().timestamp() + 3600),
            user,
        }
    }

    fn table_error(status: u16, code: &str, message: &str) -> CbError {
        CbError::Database(RemoteError::new(status, message).with_code(code))
    }

    fn auth_error(status: u16, code: &str, message: &str) -> CbError {
        CbError::Auth(RemoteError::new(status, message).with_code(code))
    }

    /// Fill server defaults: numeric id and ordered timestamps.
    fn complete_row(&self, mut row: Value) -> Value {
        let n = self.next();
        if let Some(obj) = row.as_object_mut() {
            obj.entry("id").or_insert(json!(n));
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let created = (base + Duration::seconds(n as i64)).to_rfc3339_opts(SecondsFormat::Secs, true);
            obj.entry("created_at").or_insert(json!(created));
        }
        row
    }
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let mut out = Map::new();
    for column in columns.split(',').map(str::trim) {
        if let Some(v) = row.get(column) {
            out.insert(column.to_string(), v.clone());
        }
    }
    Value::Object(out)
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        _ => std::cmp::Ordering::Equal,
    }
}

#[async_trait]
impl AuthApi for FakeBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        data: &Value,
        _redirect_to: Option<&str>,
    ) -> CbResult<SignUpOutcome> {
        if self.state.lock().unwrap().accounts.contains_key(email) {
            return Err(Self::auth_error(422, "user_already_exists", "User already registered"));
        }
        if password.len() < 6 {
            return Err(Self::auth_error(
                422,
                "weak_password",
                "Password should be at least 6 characters.",
            ));
        }

        let metadata: UserMetadata = serde_json::from_value(data.clone())?;
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata.clone(),
            created_at: Some(Utc::now()),
            updated_at: None,
            email_confirmed_at: self.autoconfirm.then(Utc::now),
        };
        self.seed(
            "users",
            json!({
                "id": user.id,
                "full_name": metadata.full_name,
                "avatar_url": metadata.avatar_url,
                "email": email,
            }),
        );
        self.state.lock().unwrap().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );

        if self.autoconfirm {
            Ok(SignUpOutcome::Session(self.issue_session(email)))
        } else {
            Ok(SignUpOutcome::ConfirmationRequired(user))
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> CbResult<Session> {
        let valid = self
            .state
            .lock()
            .unwrap()
            .accounts
            .get(email)
            .is_some_and(|a| a.password == password);
        if !valid {
            return Err(Self::auth_error(400, "invalid_credentials", "Invalid login credentials"));
        }
        Ok(self.issue_session(email))
    }

    async fn refresh_session(&self, refresh_token: &str) -> CbResult<Session> {
        let email = self.state.lock().unwrap().refresh.remove(refresh_token);
        match email {
            Some(email) => Ok(self.issue_session(&email)),
            None => Err(Self::auth_error(
                400,
                "refresh_token_not_found",
                "Invalid Refresh Token: Refresh Token Not Found",
            )),
        }
    }

    async fn get_user(&self, access_token: &str) -> CbResult<User> {
        let state = self.state.lock().unwrap();
        state
            .access
            .get(access_token)
            .map(|email| state.accounts[email].user.clone())
            .ok_or_else(|| Self::auth_error(401, "bad_jwt", "invalid JWT"))
    }

    async fn update_user(&self, access_token: &str, data: &Value) -> CbResult<User> {
        let mut state = self.state.lock().unwrap();
        let Some(email) = state.access.get(access_token).cloned() else {
            return Err(Self::auth_error(401, "bad_jwt", "invalid JWT"));
        };
        let account = state.accounts.get_mut(&email).expect("account for token");
        if let Some(name) = data.get("full_name").and_then(Value::as_str) {
            account.user.user_metadata.full_name = Some(name.to_string());
        }
        if let Some(url) = data.get("avatar_url").and_then(Value::as_str) {
            account.user.user_metadata.avatar_url = Some(url.to_string());
        }
        account.user.updated_at = Some(Utc::now());
        Ok(account.user.clone())
    }

    async fn sign_out(&self, access_token: &str) -> CbResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sign_out {
            return Err(CbError::Timeout("logout timed out".into()));
        }
        state.access.remove(access_token);
        Ok(())
    }

    fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String {
        match redirect_to {
            Some(to) => format!("http://fake.local/auth/v1/authorize?provider={provider}&redirect_to={to}"),
            None => format!("http://fake.local/auth/v1/authorize?provider={provider}"),
        }
    }
}

#[async_trait]
impl TableApi for FakeBackend {
    async fn select(&self, query: &TableQuery) -> CbResult<Vec<Value>> {
        let mut rows: Vec<Value> = self
            .rows(&query.table)
            .into_iter()
            .filter(|row| query.matches(row))
            .collect();

        for order in query.order.iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(&order.column), b.get(&order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }

        if query.single && rows.len() != 1 {
            return Err(CbError::Database(
                RemoteError::new(406, "JSON object requested, multiple (or no) rows returned")
                    .with_code("PGRST116")
                    .with_details(format!("The result contains {} rows", rows.len())),
            ));
        }

        Ok(rows.iter().map(|row| project(row, &query.columns)).collect())
    }

    async fn insert(&self, table: &str, rows: &Value, returning: Option<&str>) -> CbResult<Vec<Value>> {
        if self.state.lock().unwrap().fail_inserts_into.as_deref() == Some(table) {
            return Err(Self::table_error(
                403,
                "42501",
                &format!("new row violates row-level security policy for table \"{table}\""),
            ));
        }

        let incoming = match rows {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        let stored: Vec<Value> = incoming.into_iter().map(|row| self.complete_row(row)).collect();
        for row in &stored {
            self.seed(table, row.clone());
        }

        Ok(match returning {
            Some(columns) => stored.iter().map(|row| project(row, columns)).collect(),
            None => Vec::new(),
        })
    }

    async fn delete(&self, query: &TableQuery) -> CbResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(rows) = state.tables.get_mut(&query.table) {
            rows.retain(|row| !query.matches(row));
        }
        Ok(())
    }
}

/// Configuration with a backend set and persistence off.
pub fn create_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.backend.url = "http://fake.local".to_string();
    config.backend.anon_key = "anon".to_string();
    config.auth.persist_session = false;
    config
}

/// Context over `backend` with a detached realtime client. Frames the
/// client sends arrive on the returned receiver.
pub fn create_test_context(
    backend: Arc<FakeBackend>,
    store: Option<SessionStore>,
) -> (AppContext, mpsc::UnboundedReceiver<String>) {
    let token = AccessToken::new();
    let (realtime, frames) = RealtimeClient::detached(token.clone());
    let backends = Backends {
        auth: backend.clone(),
        tables: backend,
        realtime,
        token,
        store,
    };
    (AppContext::with_backends(create_test_config(), backends), frames)
}

/// Started context over a fresh backend.
pub async fn started_context(
    backend: Arc<FakeBackend>,
) -> (AppContext, mpsc::UnboundedReceiver<String>) {
    let (ctx, frames) = create_test_context(backend, None);
    ctx.start().await.expect("context start");
    (ctx, frames)
}
