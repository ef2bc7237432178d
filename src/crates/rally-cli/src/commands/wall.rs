//! `rally wall`

use crate::commands::{print_json, report_rejection, truncate};
use crate::OutputFormat;
use chrono::Utc;
use colored::Colorize;
use rally_core::flows::MESSAGE_MAX_CHARS;
use rally_core::gateway::WallMessage;
use rally_core::timefmt::message_age;
use rally_core::{Board, MessageWall, RallyContext};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct MessageRow {
    #[tabled(rename = "Message")]
    text: String,
    #[tabled(rename = "Posted")]
    posted: String,
}

pub async fn handle(
    context: &RallyContext,
    post: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let wall = MessageWall::with_limit(
        context.gateway.clone(),
        context.config.feeds.message_limit,
    );
    wall.refresh().await?;

    if let Some(text) = post {
        match wall.post(text).await {
            Ok(_) => {
                if format == OutputFormat::Text {
                    println!("{}", "✓ Message posted".green().bold());
                }
            }
            Err(e) if e.is_rejection() => report_rejection(e)?,
            Err(e) => {
                println!("{} {}", "✗ Message not posted:".red().bold(), e);
                return Err(e.into());
            }
        }
    }

    let messages = wall.messages();
    if format == OutputFormat::Json {
        return print_json(&messages);
    }

    if messages.is_empty() {
        println!("{}", "No messages yet. Be the first!".yellow());
        return Ok(());
    }

    let count = messages.len();
    println!("{}", Table::new(rows(messages)));
    println!("\nShowing {} messages (max {} characters each)", count, MESSAGE_MAX_CHARS);
    Ok(())
}

fn rows(messages: Vec<WallMessage>) -> Vec<MessageRow> {
    let now = Utc::now();
    messages
        .into_iter()
        .map(|message| MessageRow {
            posted: message_age(message.created_at, now),
            text: truncate(&message.text, 60),
        })
        .collect()
}
