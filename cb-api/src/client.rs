//! HTTP client for the hosted backend.
//!
//! Handles the `apikey` and bearer headers, custom headers, timeouts, and
//! the mapping of failed responses onto the backend's error object.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;

use cb_core::config::{AppConfig, BackendConfig};
use cb_core::constants;
use cb_core::error::{CbError, CbResult};
use cb_core::token::AccessToken;

use crate::response::{decode_remote_error, into_cb_error, ErrorSource};

/// Accept header value asking the table endpoint for a single JSON object.
pub const SINGLE_OBJECT_ACCEPT: &str = "application/vnd.pgrst.object+json";

/// HTTP client for the auth and table endpoints.
///
/// Cheap to clone; clones share the connection pool and the access token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Sanitized project URL (scheme + host, no trailing slash).
    base_url: String,
    /// Public anon key.
    anon_key: String,
    /// Database schema for the table endpoint.
    schema: String,
    /// Bearer token of the signed-in user, if any.
    token: AccessToken,
    /// Custom headers from backend config.
    custom_headers: Vec<(String, String)>,
}

impl ApiClient {
    /// Create a new ApiClient from backend configuration.
    pub fn new(config: &BackendConfig, token: AccessToken) -> CbResult<Self> {
        let base_url = AppConfig::sanitize_url(&config.url);
        if base_url.is_empty() {
            return Err(CbError::MissingConfig("backend.url".into()));
        }

        let inner = Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms))
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| CbError::Http(format!("failed to build HTTP client: {e}")))?;

        let mut custom_headers: Vec<(String, String)> = vec![(
            "x-client-info".into(),
            format!("chatbase-rs/{}", constants::APP_VERSION),
        )];
        for (k, v) in config.custom_headers.iter() {
            custom_headers.push((k.clone(), v.clone()));
        }

        Ok(Self {
            inner,
            base_url,
            anon_key: config.anon_key.clone(),
            schema: config.schema.clone(),
            token,
            custom_headers,
        })
    }

    /// Get the project URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// The shared access-token cell.
    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Full URL of an auth endpoint path (e.g. "/token").
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}{}{path}", self.base_url, constants::AUTH_PATH)
    }

    /// Full URL of a table.
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}{}/{table}", self.base_url, constants::REST_PATH)
    }

    /// Default headers: apikey, bearer, and custom headers.
    ///
    /// `bearer` overrides the shared token (auth calls made on behalf of a
    /// specific session).
    async fn default_headers(&self, bearer: Option<&str>) -> HeaderMap {
        let bearer = match bearer {
            Some(b) => b.to_string(),
            None => self.token.bearer_or(&self.anon_key).await,
        };

        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", v);
        }
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {bearer}")) {
            headers.insert(AUTHORIZATION, v);
        }
        for (key, value) in &self.custom_headers {
            if let (Ok(k), Ok(v)) = (
                reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(k, v);
            }
        }
        headers
    }

    /// Build a request against the auth endpoint.
    pub(crate) async fn auth_request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
    ) -> RequestBuilder {
        let url = self.auth_url(path);
        debug!("{} {}", method, url);
        self.inner
            .request(method, url)
            .headers(self.default_headers(bearer).await)
    }

    /// Build a request against a table.
    pub(crate) async fn rest_request(
        &self,
        method: Method,
        table: &str,
        single: bool,
    ) -> RequestBuilder {
        let url = self.rest_url(table);
        debug!("{} {}", method, url);

        let profile_header = if method == Method::GET {
            "accept-profile"
        } else {
            "content-profile"
        };
        let mut builder = self
            .inner
            .request(method, url)
            .headers(self.default_headers(None).await)
            .header(profile_header, self.schema.as_str());
        if single {
            builder = builder.header(ACCEPT, SINGLE_OBJECT_ACCEPT);
        }
        builder
    }

    /// Send a request and convert failures to `CbError`.
    pub(crate) async fn send(&self, builder: RequestBuilder, source: ErrorSource) -> CbResult<Response> {
        let response = builder.send().await.map_err(Self::classify_error)?;
        Self::check_status(response, source).await
    }

    /// Send a request and decode its JSON body.
    pub(crate) async fn send_json(
        &self,
        builder: RequestBuilder,
        source: ErrorSource,
    ) -> CbResult<serde_json::Value> {
        let response = self.send(builder, source).await?;
        let text = response
            .text()
            .await
            .map_err(|e| CbError::Http(format!("failed to read response body: {e}")))?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Check the HTTP status code and decode the backend error if needed.
    async fn check_status(response: Response, source: ErrorSource) -> CbResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let remote = decode_remote_error(status.as_u16(), &body, source);
        debug!("backend rejected request: {remote}");
        Err(into_cb_error(remote, source))
    }

    /// Classify a reqwest error into a CbError variant.
    fn classify_error(e: reqwest::Error) -> CbError {
        if e.is_timeout() {
            CbError::Timeout(e.to_string())
        } else if e.is_connect() {
            CbError::Http(format!("connection failed: {e}"))
        } else {
            CbError::Http(e.to_string())
        }
    }
}
