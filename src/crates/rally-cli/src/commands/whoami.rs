//! `rally whoami`

use crate::commands::print_json;
use crate::OutputFormat;
use colored::Colorize;
use rally_core::identity::IdentitySource;
use rally_core::RallyContext;
use serde_json::json;

pub fn handle(context: &RallyContext, format: OutputFormat) -> anyhow::Result<()> {
    let session = &context.session;
    let source = match session.source() {
        IdentitySource::Stored => "stored",
        IdentitySource::Derived => "derived",
        IdentitySource::Ephemeral => "ephemeral",
    };

    if format == OutputFormat::Json {
        return print_json(&json!({
            "visitor_id": session.visitor(),
            "source": source,
            "persistent": session.is_persistent(),
        }));
    }

    println!("{} {}", "Visitor:".bold(), session.visitor().to_string().cyan());
    println!("{} {}", "Source:".bold(), source);
    if !session.is_persistent() {
        println!(
            "{}",
            "⚠ Local storage unavailable, this id will not survive a restart".yellow()
        );
    }
    Ok(())
}
