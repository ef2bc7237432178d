//! rally CLI - terminal front end for the OG support board
//!
//! Main entry point for the rally command-line tool.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rally_core::{Backend, ConfigLoader};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rally")]
#[command(about = "rally - support the orientation guides from your terminal", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Use an in-process backend instead of the configured service
    #[arg(long, global = true)]
    offline: bool,

    /// Project config file to use instead of ./.rally/rally.toml
    #[arg(long, global = true, env = "RALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default user config to ~/.rally/rally.toml
    Init,

    /// Show this visitor's id
    Whoami,

    /// Show the support counter
    Support {
        /// Cast your support vote
        #[arg(long)]
        vote: bool,
    },

    /// Show the OG poll
    Poll {
        /// Answer the poll: yes or no
        #[arg(long)]
        vote: Option<String>,
    },

    /// Show the message wall
    Wall {
        /// Post a message (up to 140 characters)
        #[arg(long)]
        post: Option<String>,
    },

    /// Show shared experiences
    Stories {
        /// Share an experience (up to 500 characters)
        #[arg(long)]
        share: Option<String>,
        /// Name to show with the story; anonymous when omitted
        #[arg(long, requires = "share")]
        name: Option<String>,
    },

    /// Show the guide spotlight
    Guides,

    /// Follow new votes, poll answers, messages and stories until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_paths(
            ConfigLoader::new().user_config_path().cloned(),
            path.clone(),
        ),
        None => ConfigLoader::new(),
    };

    if let Commands::Init = cli.command {
        return commands::init::handle(&loader).await;
    }

    let config = loader.load().await?;
    rally_core::logging::init(&config.logging);

    let backend = if cli.offline {
        Backend::Offline
    } else {
        Backend::Remote
    };
    let context = commands::connect(config, backend).await?;

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Whoami => commands::whoami::handle(&context, cli.format),
        Commands::Support { vote } => commands::support::handle(&context, vote, cli.format).await,
        Commands::Poll { vote } => commands::poll::handle(&context, vote, cli.format).await,
        Commands::Wall { post } => commands::wall::handle(&context, post, cli.format).await,
        Commands::Stories { share, name } => {
            commands::stories::handle(&context, share, name, cli.format).await
        }
        Commands::Guides => commands::guides::handle(&context, cli.format).await,
        Commands::Watch => commands::watch::handle(&context).await,
    }
}
