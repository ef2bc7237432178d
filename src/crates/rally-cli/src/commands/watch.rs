//! `rally watch`
//!
//! Follows inserts on every live stream until Ctrl-C.

use chrono::{Local, Utc};
use colored::Colorize;
use rally_core::gateway::Record;
use rally_core::{RallyContext, RecordKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub async fn handle(context: &RallyContext) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut subscriptions = Vec::new();

    for kind in RecordKind::LIVE {
        let mut subscription = context.gateway.subscribe_inserts(kind).await?;
        let tx = tx.clone();
        subscriptions.push(tokio::spawn(async move {
            while let Some(record) = subscription.next().await {
                if tx.send(record).is_err() {
                    break;
                }
            }
            debug!(kind = %kind, "Subscription ended");
        }));
    }
    drop(tx);

    println!(
        "{} {}",
        "✓ Watching votes, poll answers, messages and stories.".green().bold(),
        "Press Ctrl-C to stop.".bright_black()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            record = rx.recv() => match record {
                Some(record) => println!("{}", describe(&record)),
                None => {
                    warn!("All subscriptions ended");
                    println!("{}", "✗ Connection closed".red().bold());
                    break;
                }
            },
            _ = &mut shutdown => {
                println!();
                break;
            }
        }
    }

    // aborting the forwarders drops their subscriptions, which leaves the channels
    for task in subscriptions {
        task.abort();
    }
    Ok(())
}

fn describe(record: &Record) -> String {
    let at = record
        .created_at()
        .unwrap_or_else(Utc::now)
        .with_timezone(&Local)
        .format("%H:%M:%S");

    let line = match record {
        Record::SupportVote(_) => format!("{} someone added their support", "vote".green()),
        Record::PollResponse(response) => {
            format!("{} someone answered {}", "poll".cyan(), response.option.bold())
        }
        Record::WallMessage(message) => format!("{} {}", "wall".magenta(), message.text),
        Record::Experience(story) => format!(
            "{} {}: {}",
            "story".blue(),
            story.display_name().bold(),
            story.text
        ),
        Record::GuideProfile(guide) => format!("{} {}", "guide".yellow(), guide.name),
    };
    format!("[{}] {}", at, line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_core::gateway::{Experience, WallMessage};

    #[test]
    fn test_describe_mentions_content() {
        colored::control::set_override(false);
        let message = Record::WallMessage(WallMessage {
            id: "1".to_string(),
            text: "Thank you OGs!".to_string(),
            created_at: Utc::now(),
        });
        assert!(describe(&message).ends_with("wall Thank you OGs!"));

        let story = Record::Experience(Experience {
            id: "2".to_string(),
            name: None,
            text: "Found my way".to_string(),
            created_at: Utc::now(),
        });
        assert!(describe(&story).contains("Anonymous: Found my way"));
    }
}
