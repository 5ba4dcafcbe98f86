//! Config commands.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;
use dialoguer::{Confirm, Input};

use cb_core::config::{AppConfig, ConfigHandle};
use cb_core::error::{CbError, CbResult};

use super::prompt_error;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the configuration file path.
    Path,
    /// Set the backend URL and anon key and save them.
    SetBackend {
        /// Project URL.
        #[arg(long)]
        url: Option<String>,
        /// Public anon key.
        #[arg(long)]
        anon_key: Option<String>,
    },
}

/// Hide all but the first few characters of a key.
fn mask(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let shown: String = key.chars().take(6).collect();
    format!("{shown}...")
}

pub async fn run(
    config: ConfigHandle,
    path: PathBuf,
    action: ConfigAction,
    format: OutputFormat,
) -> CbResult<()> {
    match action {
        ConfigAction::Show => {
            let mut cfg = config.snapshot().await;
            cfg.backend.anon_key = mask(&cfg.backend.anon_key);
            match format {
                OutputFormat::Json => super::print_json(&cfg)?,
                OutputFormat::Text => {
                    let text = toml_text(&cfg)?;
                    println!("{text}");
                }
            }
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::SetBackend { url, anon_key } => {
            let url = match url {
                Some(u) => u,
                None => Input::new()
                    .with_prompt("Project URL")
                    .interact_text()
                    .map_err(prompt_error)?,
            };
            let anon_key = match anon_key {
                Some(k) => k,
                None => Input::new()
                    .with_prompt("Anon key")
                    .interact_text()
                    .map_err(prompt_error)?,
            };

            {
                let mut cfg = config.write().await;
                cfg.backend.url = AppConfig::sanitize_url(&url);
                cfg.backend.anon_key = anon_key.trim().to_string();
            }

            if path.exists() {
                let overwrite = Confirm::new()
                    .with_prompt(format!("Overwrite {}?", path.display()))
                    .default(true)
                    .interact()
                    .map_err(prompt_error)?;
                if !overwrite {
                    println!("Not saved.");
                    return Ok(());
                }
            }

            config.snapshot().await.save_to_file(&path)?;
            println!("{} Saved {}", style("OK").green().bold(), path.display());
        }
    }
    Ok(())
}

fn toml_text(cfg: &AppConfig) -> CbResult<String> {
    toml::to_string_pretty(cfg).map_err(|e| CbError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask(""), "(not set)");
        assert_eq!(mask("eyJhbGciOiJIUzI1NiJ9"), "eyJhbG...");
    }
}
