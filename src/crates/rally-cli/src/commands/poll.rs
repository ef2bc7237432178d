//! `rally poll`

use crate::commands::{print_json, report_rejection};
use crate::OutputFormat;
use colored::Colorize;
use rally_core::{Board, PollBoard, PollOption, PollTally, RallyContext, RallyError};
use serde_json::json;

pub async fn handle(
    context: &RallyContext,
    vote: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    // reject a bad option before touching the backend
    let choice = vote.as_deref().map(str::parse::<PollOption>).transpose()?;

    let board = PollBoard::new(context.gateway.clone(), context.session.clone());
    board.refresh().await?;

    if let Some(option) = choice {
        match board.vote(option).await {
            Ok(_) => {
                if format == OutputFormat::Text {
                    println!("{} {}", "✓ Answer recorded:".green().bold(), option);
                }
            }
            Err(RallyError::AlreadySubmitted(_)) => {
                if format == OutputFormat::Text {
                    println!("{}", "You have already answered this poll".yellow());
                }
            }
            Err(e) if e.is_rejection() => report_rejection(e)?,
            Err(e) => {
                println!("{} {}", "✗ Answer failed:".red().bold(), e);
                return Err(e.into());
            }
        }
    }

    let tally = board.tally();
    let user_vote = board.user_vote();

    if format == OutputFormat::Json {
        return print_json(&json!({
            "question": board.question(),
            "yes": tally.yes,
            "no": tally.no,
            "yes_percent": tally.percentage(PollOption::Yes),
            "no_percent": tally.percentage(PollOption::No),
            "your_answer": user_vote.map(|o| o.as_str()),
        }));
    }

    println!("\n{}", board.question().bold().underline());
    for line in result_lines(&tally, user_vote) {
        println!("{}", line);
    }
    if user_vote.is_none() {
        println!("\nAnswer with:");
        println!("  {}", "rally poll --vote yes".cyan());
        println!("  {}", "rally poll --vote no".cyan());
    }
    Ok(())
}

/// Result rows, shown as soon as anyone has answered
fn result_lines(tally: &PollTally, own: Option<PollOption>) -> Vec<String> {
    if tally.total() == 0 {
        return vec!["No answers yet".yellow().to_string()];
    }

    let mut lines: Vec<String> = PollOption::ALL
        .into_iter()
        .map(|option| {
            let marker = if Some(option) == own { "●" } else { " " };
            format!(
                "{} {:<4} {:>5.1}%  ({} votes)",
                marker,
                option.as_str(),
                tally.percentage(option),
                tally.votes(option)
            )
        })
        .collect();
    lines.push(format!("\nTotal votes: {}", tally.total()));
    lines
}
