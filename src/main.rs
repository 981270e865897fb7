use clap::{Parser, Subcommand};
use linkcal_core::{
    Backend, DocumentStore, IdentityResolver, KeyValueStore, Location, MemoryView,
    RemoteDocuments, StatusBoard, StatusKind, SyncCoordinator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

mod clipboard;
mod commands;
mod config;
mod db;
mod location_file;
mod prompt;

use commands::{CalendarCommand, ConfigCommand};
use config::Config;
use db::{init_db, SqliteKeyValue};
use location_file::FileLocation;
use prompt::TerminalPrompter;

#[derive(Parser)]
#[command(name = "linkcal")]
#[command(version)]
#[command(about = "A shared calendar you hand out as a link", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Open this link before running the command
    #[arg(long, global = true)]
    url: Option<Url>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Calendar(CalendarCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.clone())?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config, cli.config).await,
        Some(Commands::Calendar(cmd)) => cmd,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let backend = open_backend(&config).await?;

    // Find out which calendar we are on
    let location = FileLocation::open(config.location_path(), config.page_url.value.clone());
    if let Some(url) = cli.url {
        location.navigate(url);
    }
    if let Some(url) = command.destination(&location.href())? {
        location.navigate(url);
    }
    let resolver = IdentityResolver::new(location);
    let id = resolver.resolve();
    resolver.publish(&id);

    let status = StatusBoard::new();
    let coordinator = SyncCoordinator::new(backend, Box::new(MemoryView::new()), status.clone());
    coordinator.switch_to(id).await;

    let result = command
        .run(&coordinator, &resolver, TerminalPrompter::stdin())
        .await;

    if let Some(shown) = status.current() {
        match shown.kind {
            StatusKind::Info => eprintln!("{}", shown),
            StatusKind::Error => eprintln!("Warning: {}", shown),
        }
    }

    result
}

/// The cloud store when a server is configured, the local database otherwise.
async fn open_backend(config: &Config) -> Result<Backend, Box<dyn std::error::Error>> {
    let pool = init_db(&config.database_path.value).await?;
    let local: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValue::new(pool));

    let cloud: Option<Arc<dyn DocumentStore>> = match &config.cloud.server_url {
        Some(url) if config.cloud.is_configured() => {
            tracing::debug!("Using cloud store at {}", url);
            Some(Arc::new(RemoteDocuments::new(url.trim())))
        }
        _ => None,
    };

    Ok(Backend::select(cloud, local))
}
