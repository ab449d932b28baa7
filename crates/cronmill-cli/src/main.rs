mod config;
mod run;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cronmill", about = "Persistent recurring-job scheduler")]
struct Cli {
    /// Path to the config file (default: ~/.cronmill/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scheduler pass: schedule, process, cleanup
    Run {
        /// Keep running, repeating the pass at a fixed interval
        #[arg(long)]
        watch: bool,

        /// Seconds between passes in watch mode
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
    /// Show instance counts and recent history
    Status,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Run { watch, interval } => rt.block_on(run::run(config, watch, interval))?,
        Commands::Status => rt.block_on(status::run(config))?,
    }

    Ok(())
}
