use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod chat;
mod cli;
mod core;
mod daemon;
mod sources;

use crate::core::models::Metric;
use crate::core::settings::Settings;

#[derive(Parser)]
#[command(name = "kasper-channel-bot")]
#[command(author, version, about = "Keeps Discord channel names in sync with KASPER prices")]
struct Cli {
    /// Path to a config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename channels on a schedule until interrupted
    Daemon,

    /// Fetch current values and print the labels without renaming anything
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Only fetch this metric
        #[arg(long, value_enum)]
        metric: Option<Metric>,
    },

    /// Run each channel update once and exit
    Once {
        /// Only update this metric's channel
        #[arg(long, value_enum)]
        metric: Option<Metric>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let settings = Settings::load(path.map(PathBuf::as_path))?;
    settings.validate()?;
    Ok(settings)
}

fn selected(metric: Option<Metric>) -> Vec<Metric> {
    metric.map_or_else(|| Metric::ALL.to_vec(), |m| vec![m])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Daemon);

    if let Commands::Completions { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let settings = load_settings(cli.config.as_ref())?;
    init_logging(settings.logging.json);

    match command {
        Commands::Daemon => daemon::run(settings).await,
        Commands::Status { json, metric } => {
            cli::status::run(&settings, json, &selected(metric)).await
        }
        Commands::Once { metric } => cli::once::run(&settings, &selected(metric)).await,
        Commands::Completions { .. } => Ok(()),
    }
}
