use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{AddArgs, ConfigArgs, ListArgs, ParseArgs, ScanArgs};
use config::AppConfig;

#[derive(Parser)]
#[command(name = "spendscan")]
#[command(about = "Track expenses and pull line items out of receipt text")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse receipt text into line items
    Parse(ParseArgs),
    /// Recognize a receipt image and parse the result
    Scan(ScanArgs),
    /// Record an expense by hand
    Add(AddArgs),
    /// List recorded expenses
    List(ListArgs),
    /// Delete an expense by id
    Delete { id: i64 },
    /// Show spending statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config(ConfigArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load(&config_path)?;
    debug!("Using config {}", config_path.display());

    match cli.command {
        Commands::Parse(args) => commands::parse(args, &config).await,
        Commands::Scan(args) => commands::scan(args, &config).await,
        Commands::Add(args) => commands::add(args, &config).await,
        Commands::List(args) => commands::list(args, &config).await,
        Commands::Delete { id } => commands::delete(id, &config).await,
        Commands::Stats { json } => commands::stats(json, &config).await,
        Commands::Config(args) => commands::config(args, &config_path, &config),
    }
}
