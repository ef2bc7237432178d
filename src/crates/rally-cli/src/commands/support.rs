//! `rally support`

use crate::commands::{print_json, report_rejection};
use crate::OutputFormat;
use colored::Colorize;
use rally_core::{Board, RallyContext, RallyError, SupportBoard, SupportSnapshot};
use serde_json::json;

const BAR_WIDTH: usize = 30;

pub async fn handle(context: &RallyContext, vote: bool, format: OutputFormat) -> anyhow::Result<()> {
    let board = SupportBoard::new(context.gateway.clone(), context.session.clone());
    board.refresh().await?;

    if vote {
        match board.vote().await {
            Ok(_) => {
                if format == OutputFormat::Text {
                    println!("{}", "✓ Thanks for standing with the OGs!".green().bold());
                }
            }
            Err(RallyError::AlreadySubmitted(_)) => {
                if format == OutputFormat::Text {
                    println!("{}", "You have already voted".yellow());
                }
            }
            Err(e) if e.is_rejection() => report_rejection(e)?,
            Err(e) => {
                println!("{} {}", "✗ Vote failed:".red().bold(), e);
                return Err(e.into());
            }
        }
    }

    let snapshot = board.snapshot();
    if format == OutputFormat::Json {
        return print_json(&json!({
            "count": snapshot.count,
            "goal": snapshot.goal,
            "progress": snapshot.progress(),
            "has_voted": snapshot.has_voted,
        }));
    }

    print_snapshot(&snapshot);
    Ok(())
}

fn print_snapshot(snapshot: &SupportSnapshot) {
    println!("\n{}", "Support the OGs".bold().underline());
    println!(
        "{} / {} supporters",
        snapshot.count.to_string().bold(),
        snapshot.goal
    );
    println!("[{}] {:.1}%", progress_bar(snapshot.progress()), snapshot.progress());
    if snapshot.has_voted {
        println!("{}", "✓ You support the OGs".green());
    } else {
        println!("Run {} to add your support", "rally support --vote".cyan());
    }
}

fn progress_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "#".repeat(filled).green(), "-".repeat(BAR_WIDTH - filled))
}
