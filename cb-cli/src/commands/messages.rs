//! Message commands.

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use cb_core::config::ConfigHandle;
use cb_core::error::CbResult;
use cb_models::{Message, RowId};
use cb_services::{AppContext, MessageChange};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum MessagesAction {
    /// List the messages of a chat, oldest first.
    List {
        /// Chat id.
        chat: String,
        /// Only show the last N messages.
        #[arg(short = 'n', long)]
        last: Option<usize>,
    },
    /// Send a message as the signed-in user.
    Send {
        /// Chat id.
        chat: String,
        /// Message text.
        text: String,
    },
    /// Print new, edited, and deleted messages of a chat until interrupted.
    Watch {
        /// Chat id.
        chat: String,
    },
}

fn format_time(message: &Message) -> String {
    message
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn print_change(change: &MessageChange, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let line = serde_json::json!({
                "event": change.kind.as_str(),
                "message": change.message,
            });
            println!("{line}");
        }
        OutputFormat::Text => {
            let label = match change.kind.as_str() {
                "INSERT" => style("new").green(),
                "UPDATE" => style("edited").yellow(),
                _ => style("deleted").red(),
            };
            println!(
                "[{}] {} {}: {}",
                format_time(&change.message),
                label,
                change.message.user_id.map(|u| u.to_string()).unwrap_or_default(),
                change.message.content
            );
        }
    }
}

pub async fn run(config: ConfigHandle, action: MessagesAction, format: OutputFormat) -> CbResult<()> {
    let ctx = super::start_context(&config).await?;
    let result = execute(&ctx, action, format).await;
    super::finish(&ctx, result).await
}

async fn execute(ctx: &AppContext, action: MessagesAction, format: OutputFormat) -> CbResult<()> {
    match action {
        MessagesAction::List { chat, last } => {
            let chat_id = RowId::from(chat);
            let mut messages = ctx.chat().get_messages_by_chat_id(&chat_id).await?;
            if let Some(n) = last {
                let skip = messages.len().saturating_sub(n);
                messages.drain(..skip);
            }

            match format {
                OutputFormat::Json => super::print_json(&messages)?,
                OutputFormat::Text => {
                    if messages.is_empty() {
                        println!("No messages in chat {chat_id}.");
                    } else {
                        let me = ctx.session().user().map(|u| u.id);
                        let mut table = Table::new();
                        table
                            .load_preset(UTF8_FULL)
                            .apply_modifier(UTF8_ROUND_CORNERS)
                            .set_content_arrangement(ContentArrangement::Dynamic);
                        table.set_header(vec!["Time", "From", "Message"]);
                        for message in &messages {
                            let from = match (message.user_id, me) {
                                (Some(sender), Some(me)) if sender == me => "me".to_string(),
                                (Some(sender), _) => super::truncate(&sender.to_string(), 13),
                                (None, _) => "-".to_string(),
                            };
                            table.add_row(vec![
                                format_time(message),
                                from,
                                super::truncate(&message.content, 80),
                            ]);
                        }
                        println!("{table}");
                    }
                }
            }
            Ok(())
        }
        MessagesAction::Send { chat, text } => {
            let me = super::require_user(ctx)?;
            let chat_id = RowId::from(chat);
            let message = ctx.chat().send_chat_message(&chat_id, &me.id, &text).await?;
            match format {
                OutputFormat::Json => super::print_json(&message)?,
                OutputFormat::Text => println!(
                    "{} Sent message {}.",
                    style("OK").green().bold(),
                    message.id
                ),
            }
            Ok(())
        }
        MessagesAction::Watch { chat } => {
            let chat_id = RowId::from(chat);
            let subscription = ctx
                .chat()
                .subscribe_to_messages(&chat_id, move |change| print_change(&change, format))
                .await?;

            if let OutputFormat::Text = format {
                println!(
                    "Watching {} (Ctrl-C to stop)",
                    style(subscription.topic()).cyan()
                );
            }
            tokio::signal::ctrl_c().await?;
            subscription.unsubscribe().await
        }
    }
}
