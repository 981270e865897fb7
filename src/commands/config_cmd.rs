use clap::{Args, Subcommand};
use linkcal_core::RemoteDocuments;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::OutputFormat;
use crate::config::Config;

const DEFAULT_CONFIG: &str = r#"# linkcal configuration

# Path to the SQLite database holding local calendars
# (default: ~/.local/share/linkcal/linkcal.db)
# database_path: ~/.local/share/linkcal/linkcal.db

# Base address of the calendar page; the calendar id is added as ?id=...
# page_url: http://localhost/

# Cloud document server. When set, calendars are shared through it.
# cloud:
#   server_url: http://localhost:8080
"#;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

impl ConfigCommand {
    pub async fn run(
        &self,
        config: &Config,
        config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                config_path
                                    .unwrap_or_else(Config::default_config_path)
                                    .display()
                            );
                        }
                        println!();

                        println!("database_path: {}", config.database_path.value.display());
                        println!("  source: {}", config.database_path.source);
                        println!();

                        println!("page_url: {}", config.page_url.value);
                        println!("  source: {}", config.page_url.source);
                        println!();

                        match &config.cloud.server_url {
                            Some(url) if config.cloud.is_configured() => {
                                let remote = RemoteDocuments::new(url.trim());
                                println!("cloud.server_url: {}", remote.server_url());
                                println!("  server: {}", server_state(&remote).await);
                            }
                            _ => println!("cloud.server_url: (not set, calendars stay local)"),
                        }
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = config_path.unwrap_or_else(Config::default_config_path);
                if write_default_config(&config_path)? {
                    println!("Created config file: {}", config_path.display());
                    println!("\nEdit this file to customize your settings.");
                } else {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'linkcal config show' to view current configuration.");
                }
                Ok(())
            }
        }
    }
}

/// One-line health summary of the configured document server.
async fn server_state(remote: &RemoteDocuments) -> String {
    match remote.check().await {
        Ok(health) => format!("{} (version {})", health.status, health.version),
        Err(e) => format!("unreachable ({})", e),
    }
}

/// Writes the commented default config. Returns false if a file is already
/// there.
fn write_default_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::File::create(path)?;
    file.write_all(DEFAULT_CONFIG.as_bytes())?;
    Ok(true)
}
