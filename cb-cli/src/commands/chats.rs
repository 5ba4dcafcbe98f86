//! Chat commands.

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;
use serde_json::json;

use cb_core::config::ConfigHandle;
use cb_core::error::CbResult;
use cb_models::RowId;
use cb_services::AppContext;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ChatsAction {
    /// Open the private chat with a user, creating it if needed.
    Open {
        /// User id of the other person.
        user: String,
    },
    /// Look up an existing chat with a user without creating one.
    Find {
        /// User id of the other person.
        user: String,
    },
    /// Show a chat and its members.
    Show {
        /// Chat id.
        chat: String,
    },
    /// Show a user's public profile.
    User {
        /// User id.
        user: String,
    },
}

pub async fn run(config: ConfigHandle, action: ChatsAction, format: OutputFormat) -> CbResult<()> {
    let ctx = super::start_context(&config).await?;
    let result = execute(&ctx, action, format).await;
    super::finish(&ctx, result).await
}

async fn execute(ctx: &AppContext, action: ChatsAction, format: OutputFormat) -> CbResult<()> {
    let chats = ctx.chat();

    match action {
        ChatsAction::Open { user } => {
            let me = super::require_user(ctx)?;
            let other = chats.get_chat_user(&super::parse_user_id(&user)?).await?;
            let chat_id = chats.get_or_create_chat(&me, &other).await?;
            match format {
                OutputFormat::Json => super::print_json(&json!({ "chat_id": chat_id }))?,
                OutputFormat::Text => println!(
                    "Chat with {}: {}",
                    style(other.display_name()).bold(),
                    style(&chat_id).cyan()
                ),
            }
            Ok(())
        }
        ChatsAction::Find { user } => {
            let me = super::require_user(ctx)?;
            let other = chats.get_chat_user(&super::parse_user_id(&user)?).await?;
            let found = chats.get_chat(&me, &other).await?;
            match (format, found) {
                (OutputFormat::Json, found) => super::print_json(&json!({ "chat_id": found }))?,
                (OutputFormat::Text, Some(id)) => println!("Existing chat: {}", style(id).cyan()),
                (OutputFormat::Text, None) => {
                    println!("No chat with {} yet.", other.display_name())
                }
            }
            Ok(())
        }
        ChatsAction::Show { chat } => {
            let chat_id = RowId::from(chat);
            let chat = chats.get_chat_by_id(&chat_id).await?;
            let member_ids = chats.get_chat_members(&chat_id).await?;
            let mut members = Vec::with_capacity(member_ids.len());
            for id in &member_ids {
                members.push(chats.get_chat_user(id).await?);
            }

            match format {
                OutputFormat::Json => super::print_json(&json!({ "chat": chat, "members": members }))?,
                OutputFormat::Text => {
                    println!(
                        "{} {} ({})",
                        style("Chat").bold(),
                        style(&chat.id).cyan(),
                        chat.chat_type.as_str()
                    );
                    if let Some(created) = chat.created_at {
                        println!("  created {}", created.format("%Y-%m-%d %H:%M"));
                    }

                    let mut table = Table::new();
                    table
                        .load_preset(UTF8_FULL)
                        .apply_modifier(UTF8_ROUND_CORNERS)
                        .set_content_arrangement(ContentArrangement::Dynamic);
                    table.set_header(vec!["Name", "User ID", "Creator"]);
                    for member in &members {
                        table.add_row(vec![
                            member.display_name().to_string(),
                            member.id.to_string(),
                            if member.id == chat.created_by { "yes" } else { "" }.to_string(),
                        ]);
                    }
                    println!("{table}");
                }
            }
            Ok(())
        }
        ChatsAction::User { user } => {
            let profile = chats.get_chat_user(&super::parse_user_id(&user)?).await?;
            match format {
                OutputFormat::Json => super::print_json(&profile)?,
                OutputFormat::Text => {
                    println!("{}", style(profile.display_name()).bold());
                    println!("  id:     {}", profile.id);
                    if let Some(url) = profile.avatar_url.as_deref().filter(|u| !u.is_empty()) {
                        println!("  avatar: {url}");
                    }
                }
            }
            Ok(())
        }
    }
}
