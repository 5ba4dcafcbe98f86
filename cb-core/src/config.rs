//! Application configuration management.
//!
//! Handles loading, saving, and accessing the backend connection settings,
//! auth behaviour, realtime tuning, and logging. Configuration is persisted
//! as TOML on disk; a few connection values can be overridden from the
//! environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::constants;
use crate::error::{CbError, CbResult};
use crate::platform::Platform;

/// Environment variable overriding `backend.url`.
pub const ENV_BACKEND_URL: &str = "CHATBASE_URL";
/// Environment variable overriding `backend.anon_key`.
pub const ENV_ANON_KEY: &str = "CHATBASE_ANON_KEY";
/// Environment variable overriding `auth.site_url`.
pub const ENV_SITE_URL: &str = "CHATBASE_SITE_URL";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hosted backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Authentication behaviour.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Realtime channel settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosted backend connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL (e.g., "https://abcdefgh.supabase.co").
    #[serde(default)]
    pub url: String,

    /// Public anon key sent as `apikey` on every request.
    #[serde(default)]
    pub anon_key: String,

    /// Custom HTTP headers added to every request.
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,

    /// API request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_ms: u64,

    /// Database schema the tables live in.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Public origin of the app, used to build email confirmation redirects.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// OAuth provider used when none is given explicitly.
    #[serde(default = "default_oauth_provider")]
    pub oauth_provider: String,

    /// Persist the session to disk between runs.
    #[serde(default = "default_true")]
    pub persist_session: bool,

    /// Path of the persisted session file. If empty, uses the default location.
    #[serde(default)]
    pub session_path: String,
}

/// Realtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Interval between heartbeat frames in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Websocket connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output in the log file.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_schema() -> String {
    constants::DEFAULT_SCHEMA.to_string()
}

fn default_site_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_oauth_provider() -> String {
    constants::DEFAULT_OAUTH_PROVIDER.to_string()
}

fn default_true() -> bool {
    true
}

fn default_heartbeat_interval() -> u64 {
    constants::REALTIME_HEARTBEAT_INTERVAL_MS
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            custom_headers: HashMap::new(),
            api_timeout_ms: default_api_timeout(),
            schema: default_schema(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            oauth_provider: default_oauth_provider(),
            persist_session: true,
            session_path: String::new(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path, or defaults if absent.
    pub fn load_default() -> CbResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> CbResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> CbResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CbError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> CbResult<PathBuf> {
        Ok(Platform::data_dir()?.join("config.toml"))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (environment, test map).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
            self.backend.url = url;
        }
        if let Some(key) = lookup(ENV_ANON_KEY).filter(|v| !v.trim().is_empty()) {
            self.backend.anon_key = key;
        }
        if let Some(site) = lookup(ENV_SITE_URL).filter(|v| !v.trim().is_empty()) {
            self.auth.site_url = site;
        }
    }

    /// Get the effective session file path, using the configured path or the default.
    pub fn effective_session_path(&self) -> CbResult<PathBuf> {
        if self.auth.session_path.is_empty() {
            Ok(Platform::data_dir()?.join("session.json"))
        } else {
            Ok(PathBuf::from(&self.auth.session_path))
        }
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> CbResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Platform::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Check whether the backend connection is configured.
    pub fn is_backend_configured(&self) -> bool {
        !self.backend.url.trim().is_empty() && !self.backend.anon_key.trim().is_empty()
    }

    /// Fail with `MissingConfig` unless the backend connection is configured.
    pub fn require_backend(&self) -> CbResult<()> {
        if self.backend.url.trim().is_empty() {
            return Err(CbError::MissingConfig(format!(
                "backend.url (or {ENV_BACKEND_URL})"
            )));
        }
        if self.backend.anon_key.trim().is_empty() {
            return Err(CbError::MissingConfig(format!(
                "backend.anon_key (or {ENV_ANON_KEY})"
            )));
        }
        Ok(())
    }

    /// Sanitize and normalize a backend or site URL.
    ///
    /// Ensures the address has a scheme and strips quotes and trailing
    /// slashes. Hosted project domains default to https, everything else
    /// (typically a local stack) to http.
    pub fn sanitize_url(address: &str) -> String {
        let trimmed = address.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else if trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1") {
            format!("http://{trimmed}")
        } else {
            format!("https://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Clone the current configuration out of the handle.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backend.api_timeout_ms, 30_000);
        assert_eq!(config.backend.schema, "public");
        assert_eq!(config.auth.oauth_provider, "github");
        assert!(config.auth.persist_session);
        assert_eq!(config.logging.level, "info");
        assert!(!config.is_backend_configured());
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            AppConfig::sanitize_url("abcdefgh.supabase.co"),
            "https://abcdefgh.supabase.co"
        );
        assert_eq!(
            AppConfig::sanitize_url("http://127.0.0.1:54321/"),
            "http://127.0.0.1:54321"
        );
        assert_eq!(
            AppConfig::sanitize_url("  \"https://example.com/\"  "),
            "https://example.com"
        );
        assert_eq!(AppConfig::sanitize_url("localhost:54321"), "http://localhost:54321");
        assert_eq!(AppConfig::sanitize_url("   "), "");
    }

    #[test]
    fn test_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            ENV_BACKEND_URL => Some("https://proj.supabase.co".into()),
            ENV_ANON_KEY => Some("anon".into()),
            ENV_SITE_URL => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.backend.url, "https://proj.supabase.co");
        assert_eq!(config.backend.anon_key, "anon");
        // Blank overrides are ignored.
        assert_eq!(config.auth.site_url, "http://localhost:5173");
        assert!(config.is_backend_configured());
        assert!(config.require_backend().is_ok());
    }

    #[test]
    fn test_require_backend_names_missing_key() {
        let mut config = AppConfig::default();
        config.backend.url = "https://proj.supabase.co".into();
        let err = config.require_backend().unwrap_err();
        assert!(err.to_string().contains("anon_key"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [backend]
            url = "https://proj.supabase.co"
            anon_key = "k"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.api_timeout_ms, 30_000);
        assert_eq!(config.realtime.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.backend.url = "https://proj.supabase.co".into();
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.backend.url, "https://proj.supabase.co");
    }
}
