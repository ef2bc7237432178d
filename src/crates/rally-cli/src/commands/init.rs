//! `rally init`

use colored::Colorize;
use rally_core::ConfigLoader;

pub async fn handle(loader: &ConfigLoader) -> anyhow::Result<()> {
    let existed = loader.user_config_path().is_some_and(|p| p.exists());
    let path = loader.write_default().await?;

    if existed {
        println!(
            "{} {}",
            "Config already exists:".yellow(),
            path.display()
        );
    } else {
        println!("{} {}", "✓ Wrote default config to".green().bold(), path.display());
        println!("  Set backend.url and backend.anon_key to connect to your project.");
    }
    Ok(())
}
