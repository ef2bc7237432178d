//! CLI command handlers

pub mod guides;
pub mod init;
pub mod poll;
pub mod stories;
pub mod support;
pub mod wall;
pub mod watch;
pub mod whoami;

use anyhow::Context;
use colored::Colorize;
use rally_core::{Backend, RallyConfig, RallyContext, RallyError};
use serde::Serialize;

/// Build the run context, naming the backend on failure
pub async fn connect(config: RallyConfig, backend: Backend) -> anyhow::Result<RallyContext> {
    RallyContext::build(config, backend).await.with_context(|| match backend {
        Backend::Remote => "Failed to set up the remote backend. Check [backend] in rally.toml or pass --offline",
        Backend::Offline => "Failed to set up the offline backend",
    })
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a submission the client refused before it reached the backend
///
/// Only guard rejections are reported here; anything else is a real failure
/// and is handed back to the caller.
pub fn report_rejection(err: RallyError) -> anyhow::Result<()> {
    if !err.is_rejection() {
        return Err(err.into());
    }
    println!("{} {}", "⚠".yellow(), err.to_string().yellow());
    Ok(())
}

/// Shorten text to `max` characters for table cells
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
