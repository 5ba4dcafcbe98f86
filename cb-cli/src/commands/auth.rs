//! Auth commands.

use clap::Subcommand;
use console::style;
use dialoguer::{Input, Password};
use serde_json::json;

use cb_core::config::ConfigHandle;
use cb_core::error::CbResult;
use cb_models::{ProfileUpdate, SignUpOutcome};
use cb_services::AppContext;

use super::prompt_error;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Create an account.
    SignUp {
        /// Display name stored on the profile.
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        /// Prompted for when omitted.
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign in with email and password.
    SignIn {
        #[arg(short, long)]
        email: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Print the OAuth authorization URL for a provider.
    Oauth {
        /// Provider name (default from config, usually github).
        provider: Option<String>,
    },
    /// Show the signed-in user.
    Whoami,
    /// Update the profile name or avatar.
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// Exchange the refresh token for a new session.
    Refresh,
    /// Sign out and forget the saved session.
    SignOut,
}

fn ask(value: Option<String>, prompt: &str) -> CbResult<String> {
    match value {
        Some(v) => Ok(v),
        None => Input::new().with_prompt(prompt).interact_text().map_err(prompt_error),
    }
}

fn ask_password(value: Option<String>) -> CbResult<String> {
    match value {
        Some(v) => Ok(v),
        None => Password::new().with_prompt("Password").interact().map_err(prompt_error),
    }
}

pub async fn run(config: ConfigHandle, action: AuthAction, format: OutputFormat) -> CbResult<()> {
    let ctx = super::start_context(&config).await?;
    let result = execute(&ctx, action, format).await;
    super::finish(&ctx, result).await
}

async fn execute(ctx: &AppContext, action: AuthAction, format: OutputFormat) -> CbResult<()> {
    match action {
        AuthAction::SignUp { username, email, password } => {
            let username = ask(username, "Username")?;
            let email = ask(email, "Email")?;
            let password = ask_password(password)?;

            let outcome = ctx.auth().sign_up(&username, &email, &password).await?;
            match format {
                OutputFormat::Json => super::print_json(&json!({
                    "user": outcome.user(),
                    "confirmation_required": matches!(outcome, SignUpOutcome::ConfirmationRequired(_)),
                }))?,
                OutputFormat::Text => match &outcome {
                    SignUpOutcome::Session(session) => println!(
                        "{} Signed up and signed in as {}.",
                        style("OK").green().bold(),
                        session.user.display_name()
                    ),
                    SignUpOutcome::ConfirmationRequired(user) => println!(
                        "{} Account created for {}. Check your inbox to confirm it, then sign in.",
                        style("OK").green().bold(),
                        user.email.as_deref().unwrap_or(&email)
                    ),
                },
            }
            Ok(())
        }
        AuthAction::SignIn { email, password } => {
            let email = ask(email, "Email")?;
            let password = ask_password(password)?;
            let session = ctx.auth().sign_in_with_password(&email, &password).await?;
            match format {
                OutputFormat::Json => super::print_json(&session.user)?,
                OutputFormat::Text => println!(
                    "{} Signed in as {}.",
                    style("OK").green().bold(),
                    session.user.display_name()
                ),
            }
            Ok(())
        }
        AuthAction::Oauth { provider } => {
            let url = ctx.auth().sign_in_with_oauth(provider.as_deref())?;
            match format {
                OutputFormat::Json => super::print_json(&json!({ "url": url }))?,
                OutputFormat::Text => {
                    println!("Open this URL in a browser to continue:");
                    println!("  {}", style(url).cyan());
                }
            }
            Ok(())
        }
        AuthAction::Whoami => {
            let user = super::require_user(ctx)?;
            match format {
                OutputFormat::Json => super::print_json(&user)?,
                OutputFormat::Text => {
                    println!("{}", style(user.display_name()).bold());
                    println!("  id:        {}", user.id);
                    println!("  email:     {}", user.email.as_deref().unwrap_or("-"));
                    println!(
                        "  confirmed: {}",
                        if user.is_confirmed() { "yes" } else { "no" }
                    );
                }
            }
            Ok(())
        }
        AuthAction::Update { name, avatar_url } => {
            let mut update = ProfileUpdate::default();
            if let Some(name) = name {
                update = update.full_name(name);
            }
            if let Some(url) = avatar_url {
                update = update.avatar_url(url);
            }
            if update.is_empty() {
                println!("Nothing to update. Pass --name or --avatar-url.");
                return Ok(());
            }

            let user = ctx.auth().update_user(&update).await?;
            match format {
                OutputFormat::Json => super::print_json(&user)?,
                OutputFormat::Text => println!(
                    "{} Profile updated for {}.",
                    style("OK").green().bold(),
                    user.display_name()
                ),
            }
            Ok(())
        }
        AuthAction::Refresh => {
            let session = ctx.auth().refresh_session().await?;
            match format {
                OutputFormat::Json => super::print_json(&json!({ "expires_at": session.expires_at }))?,
                OutputFormat::Text => println!("{} Session refreshed.", style("OK").green().bold()),
            }
            Ok(())
        }
        AuthAction::SignOut => report_sign_out(ctx.auth().sign_out().await, format),
    }
}

/// Print the sign-out result. A failed remote revocation is still an error
/// even though the local session is gone.
fn report_sign_out(remote: CbResult<()>, format: OutputFormat) -> CbResult<()> {
    match (&remote, format) {
        (_, OutputFormat::Json) => {
            super::print_json(&json!({ "signed_out": true, "remote_ok": remote.is_ok() }))?
        }
        (Ok(()), OutputFormat::Text) => println!("Signed out."),
        (Err(_), OutputFormat::Text) => println!(
            "{} Signed out locally. The server did not end the session.",
            style("WARN").yellow().bold()
        ),
    }
    remote
}
