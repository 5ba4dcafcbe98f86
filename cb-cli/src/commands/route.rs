//! Route command - run the navigation guards for a path.

use console::style;
use serde_json::json;

use cb_core::config::ConfigHandle;
use cb_core::error::CbResult;
use cb_services::Navigation;

use crate::OutputFormat;

pub async fn run(config: ConfigHandle, path: &str, format: OutputFormat) -> CbResult<()> {
    let ctx = super::start_context(&config).await?;
    let navigation = ctx.navigate(path);
    let result = print_navigation(path, &navigation, format);
    super::finish(&ctx, result).await
}

fn print_navigation(path: &str, navigation: &Navigation, format: OutputFormat) -> CbResult<()> {
    match format {
        OutputFormat::Json => {
            let value = match navigation {
                Navigation::Proceed(route) => json!({
                    "outcome": "proceed",
                    "route": route.name.as_str(),
                    "params": route.params,
                    "requires_auth": route.meta.requires_auth,
                }),
                Navigation::Redirect { to } => json!({
                    "outcome": "redirect",
                    "route": to.as_str(),
                    "path": to.path(),
                }),
                Navigation::NotFound => json!({ "outcome": "not_found" }),
            };
            super::print_json(&value)?;
        }
        OutputFormat::Text => match navigation {
            Navigation::Proceed(route) => {
                println!("{} {path} -> {}", style("OPEN").green().bold(), route.name);
                if let Some(chat_id) = route.chat_id() {
                    println!("  chatId = {chat_id}");
                }
            }
            Navigation::Redirect { to } => println!(
                "{} {path} -> {} ({})",
                style("REDIRECT").yellow().bold(),
                to.path(),
                to
            ),
            Navigation::NotFound => println!("{} {path}", style("NOT FOUND").red().bold()),
        },
    }
    Ok(())
}
