//! Backend abstractions.
//!
//! Services talk to the backend through these two traits so they can run
//! against the HTTP client or an in-memory stand-in.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use cb_core::error::{CbError, CbResult};
use cb_models::{Session, SignUpOutcome, User};

use crate::client::ApiClient;
use crate::endpoints::auth::SignUpParams;
use crate::query::TableQuery;

/// The auth endpoint.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        data: &Value,
        redirect_to: Option<&str>,
    ) -> CbResult<SignUpOutcome>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> CbResult<Session>;

    async fn refresh_session(&self, refresh_token: &str) -> CbResult<Session>;

    async fn get_user(&self, access_token: &str) -> CbResult<User>;

    /// Merge `data` into the user's metadata and return the updated user.
    async fn update_user(&self, access_token: &str, data: &Value) -> CbResult<User>;

    async fn sign_out(&self, access_token: &str) -> CbResult<()>;

    /// Authorization URL of an OAuth provider. No request is made.
    fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String;
}

/// The table endpoint.
#[async_trait]
pub trait TableApi: Send + Sync {
    async fn select(&self, query: &TableQuery) -> CbResult<Vec<Value>>;

    async fn insert(&self, table: &str, rows: &Value, returning: Option<&str>)
        -> CbResult<Vec<Value>>;

    async fn delete(&self, query: &TableQuery) -> CbResult<()>;
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        data: &Value,
        redirect_to: Option<&str>,
    ) -> CbResult<SignUpOutcome> {
        let params = SignUpParams { email, password, data };
        ApiClient::sign_up(self, &params, redirect_to).await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> CbResult<Session> {
        self.token_with_password(email, password).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> CbResult<Session> {
        self.token_with_refresh(refresh_token).await
    }

    async fn get_user(&self, access_token: &str) -> CbResult<User> {
        self.fetch_user(access_token).await
    }

    async fn update_user(&self, access_token: &str, data: &Value) -> CbResult<User> {
        self.put_user_data(access_token, data).await
    }

    async fn sign_out(&self, access_token: &str) -> CbResult<()> {
        self.logout(access_token).await
    }

    fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String {
        self.oauth_authorize_url(provider, redirect_to)
    }
}

#[async_trait]
impl TableApi for ApiClient {
    async fn select(&self, query: &TableQuery) -> CbResult<Vec<Value>> {
        self.select_rows(query).await
    }

    async fn insert(
        &self,
        table: &str,
        rows: &Value,
        returning: Option<&str>,
    ) -> CbResult<Vec<Value>> {
        self.insert_rows(table, rows, returning).await
    }

    async fn delete(&self, query: &TableQuery) -> CbResult<()> {
        self.delete_rows(query).await
    }
}

/// Run a read query and decode every row.
pub async fn select_as<T: DeserializeOwned>(
    api: &dyn TableApi,
    query: &TableQuery,
) -> CbResult<Vec<T>> {
    api.select(query)
        .await?
        .iter()
        .map(|row| Ok(T::deserialize(row)?))
        .collect()
}

/// Run a single-row query and decode the row.
pub async fn select_single_as<T: DeserializeOwned>(
    api: &dyn TableApi,
    query: &TableQuery,
) -> CbResult<T> {
    let query = query.clone().single();
    let mut rows = api.select(&query).await?;
    match rows.len() {
        1 => Ok(T::deserialize(rows.remove(0))?),
        n => Err(CbError::Internal(format!(
            "single-row query on {} returned {n} rows",
            query.table
        ))),
    }
}

/// Insert rows and decode the returned representation.
pub async fn insert_as<T: DeserializeOwned, R: Serialize + ?Sized>(
    api: &dyn TableApi,
    table: &str,
    rows: &R,
    returning: &str,
) -> CbResult<Vec<T>> {
    let value = serde_json::to_value(rows)?;
    api.insert(table, &value, Some(returning))
        .await?
        .into_iter()
        .map(|row| Ok(T::deserialize(row)?))
        .collect()
}
