//! `rally guides`

use crate::commands::{print_json, truncate};
use crate::OutputFormat;
use colored::Colorize;
use rally_core::{Board, GuideSpotlight, RallyContext};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct GuideRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Department")]
    department: String,
    #[tabled(rename = "Quote")]
    quote: String,
}

pub async fn handle(context: &RallyContext, format: OutputFormat) -> anyhow::Result<()> {
    let spotlight = GuideSpotlight::new(context.gateway.clone());
    spotlight.refresh().await?;

    let guides = spotlight.guides();
    if format == OutputFormat::Json {
        return print_json(&guides);
    }

    if guides.is_empty() {
        println!("{}", "No guides listed".yellow());
        return Ok(());
    }

    let rows: Vec<GuideRow> = guides
        .into_iter()
        .map(|guide| GuideRow {
            name: guide.name,
            department: guide.department,
            quote: format!("\"{}\"", truncate(&guide.quote, 50)),
        })
        .collect();

    println!("\n{}", "Meet the OGs".bold().underline());
    println!("{}", Table::new(rows));
    Ok(())
}
