//! linkcal Document Server
//!
//! Stores calendar documents and pushes changes to every page watching them.
//!
//! # Configuration
//!
//! Environment variables:
//! - `LINKCAL_PORT`: Port to listen on (default: 8080)
//! - `LINKCAL_DATA_DIR`: Directory to store documents (default: ~/.local/share/linkcal-server)
//! - `LINKCAL_CORS_ORIGIN`: Allowed browser origin, or `*` (default: CORS disabled)
//!
//! See [`linkcal::server::routes`] for the endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Directory to store documents
    data_dir: PathBuf,
    /// Allowed CORS origin
    cors_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("LINKCAL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("LINKCAL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("linkcal-server")
            });

        let cors_origin = std::env::var("LINKCAL_CORS_ORIGIN")
            .ok()
            .filter(|origin| !origin.trim().is_empty());

        Self {
            port,
            data_dir,
            cors_origin,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkcal_server=info,linkcal=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Config::from_env()).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| format!("Failed to create data directory: {}", e))?;

    tracing::info!("Data directory: {}", config.data_dir.display());
    match &config.cors_origin {
        Some(origin) => tracing::info!("CORS origin: {}", origin),
        None => tracing::info!("CORS disabled"),
    }

    let app = linkcal::server::build_app(&config.data_dir, config.cors_origin.as_deref())
        .map_err(|e| format!("Invalid LINKCAL_CORS_ORIGIN: {}", e))?;

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
