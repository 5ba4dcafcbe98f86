//! CLI command implementations.

pub mod auth;
pub mod chats;
pub mod config;
pub mod messages;
pub mod route;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;

use cb_core::config::ConfigHandle;
use cb_core::error::{CbError, CbResult};
use cb_models::User;
use cb_services::AppContext;

/// Build and start the application context, restoring any saved session.
pub async fn start_context(config: &ConfigHandle) -> CbResult<AppContext> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Connecting...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = async {
        let ctx = AppContext::from_config(config.snapshot().await)?;
        ctx.start().await?;
        Ok::<_, CbError>(ctx)
    }
    .await;

    spinner.finish_and_clear();
    result
}

/// Stop the context after a command. The command's error wins over a
/// shutdown error.
pub async fn finish(ctx: &AppContext, result: CbResult<()>) -> CbResult<()> {
    let shutdown = ctx.shutdown().await;
    result.and(shutdown)
}

/// The signed-in user, or `NotAuthenticated`.
pub fn require_user(ctx: &AppContext) -> CbResult<User> {
    ctx.session().user().ok_or(CbError::NotAuthenticated)
}

pub fn parse_user_id(s: &str) -> CbResult<Uuid> {
    Uuid::parse_str(s.trim()).map_err(|e| CbError::Config(format!("invalid user id '{s}': {e}")))
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CbResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Truncate a string to a maximum number of characters, appending an
/// ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Map a prompt failure into the crate error.
pub fn prompt_error(e: dialoguer::Error) -> CbError {
    CbError::Internal(format!("prompt failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::config::AppConfig;
    use cb_services::{Service, ServiceState};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_parse_user_id() {
        assert!(parse_user_id(" 3f0b6a2e-9a43-4d6c-9c1e-5d3f4b0a1c2d ").is_ok());
        assert!(matches!(parse_user_id("bob"), Err(CbError::Config(_))));
    }

    #[tokio::test]
    async fn test_finish_stops_context_on_command_error() {
        let mut config = AppConfig::default();
        config.backend.url = "http://localhost:54321".to_string();
        config.backend.anon_key = "anon".to_string();
        config.auth.persist_session = false;
        let ctx = AppContext::from_config(config).unwrap();

        let result = finish(&ctx, Err(CbError::NotAuthenticated)).await;
        assert!(matches!(result, Err(CbError::NotAuthenticated)));
        assert_eq!(ctx.auth().state(), ServiceState::Stopped);
        assert_eq!(ctx.chat().state(), ServiceState::Stopped);

        assert!(finish(&ctx, Ok(())).await.is_ok());
    }
}
