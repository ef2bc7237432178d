//! `rally stories`

use crate::commands::{print_json, report_rejection, truncate};
use crate::OutputFormat;
use chrono::Utc;
use colored::Colorize;
use rally_core::gateway::Experience;
use rally_core::timefmt::experience_age;
use rally_core::{Board, ExperienceBoard, RallyContext};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct StoryRow {
    #[tabled(rename = "From")]
    name: String,
    #[tabled(rename = "Story")]
    text: String,
    #[tabled(rename = "Shared")]
    shared: String,
}

pub async fn handle(
    context: &RallyContext,
    share: Option<String>,
    name: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let board = ExperienceBoard::with_limit(
        context.gateway.clone(),
        context.config.feeds.experience_limit,
    );
    board.refresh().await?;

    if let Some(text) = share {
        match board.share(name.as_deref(), text).await {
            Ok(story) => {
                if format == OutputFormat::Text {
                    println!(
                        "{} {}",
                        "✓ Story shared as".green().bold(),
                        story.display_name()
                    );
                }
            }
            Err(e) if e.is_rejection() => report_rejection(e)?,
            Err(e) => {
                println!("{} {}", "✗ Story not shared:".red().bold(), e);
                return Err(e.into());
            }
        }
    }

    let stories = board.experiences();
    if format == OutputFormat::Json {
        return print_json(&stories);
    }

    if stories.is_empty() {
        println!("{}", "No stories yet".yellow());
        return Ok(());
    }

    let count = stories.len();
    println!("{}", Table::new(rows(stories)));
    println!("\nTotal: {} stories", count);
    Ok(())
}

fn rows(stories: Vec<Experience>) -> Vec<StoryRow> {
    let now = Utc::now();
    stories
        .into_iter()
        .map(|story| StoryRow {
            name: story.display_name().to_string(),
            text: truncate(&story.text, 70),
            shared: experience_age(story.created_at, now),
        })
        .collect()
}
