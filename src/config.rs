use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Cloud document store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CloudConfig {
    /// Server URL (e.g., "http://localhost:8080" or "https://cal.example.com")
    pub server_url: Option<String>,
}

impl CloudConfig {
    /// Returns true if a cloud store should be used
    pub fn is_configured(&self) -> bool {
        self.server_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database holding local calendars
    pub database_path: ConfigValue<PathBuf>,
    /// Base location of the calendar page
    pub page_url: ConfigValue<Url>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub cloud: CloudConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    page_url: Option<String>,
    cloud: Option<CloudConfig>,
}

pub const DEFAULT_PAGE_URL: &str = "http://localhost/";

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("linkcal.db");

        // Start with defaults
        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut page_url = ConfigValue::new(parse_url(DEFAULT_PAGE_URL)?, ConfigSource::Default);
        let mut config_file = None;
        let mut cloud = CloudConfig::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            // A file of only comments is an empty document
            let file_config: ConfigFile = if is_blank(&contents) {
                ConfigFile::default()
            } else {
                serde_yaml::from_str(&contents)
                    .map_err(|e| ConfigError::ParseError(path.clone(), e))?
            };

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(url) = file_config.page_url {
                page_url = ConfigValue::new(parse_url(&url)?, ConfigSource::File);
            }
            if let Some(cloud_config) = file_config.cloud {
                cloud = cloud_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("LINKCAL_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("LINKCAL_PAGE_URL") {
            page_url = ConfigValue::new(parse_url(&url)?, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("LINKCAL_SERVER_URL") {
            cloud.server_url = Some(url);
        }

        Ok(Self {
            database_path,
            page_url,
            config_file,
            cloud,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/linkcal/
    /// - macOS: ~/Library/Application Support/linkcal/
    /// - Windows: %APPDATA%/linkcal/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkcal")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/linkcal/
    /// - macOS: ~/Library/Application Support/linkcal/
    /// - Windows: %APPDATA%/linkcal/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkcal")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }

    /// File remembering the page location between runs, next to the database.
    pub fn location_path(&self) -> PathBuf {
        self.database_path
            .value
            .parent()
            .map(|dir| dir.join("location"))
            .unwrap_or_else(|| PathBuf::from("location"))
    }
}

fn is_blank(yaml: &str) -> bool {
    yaml.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e))
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidUrl(String, url::ParseError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidUrl(url, e) => {
                write!(f, "Invalid page URL '{}': {}", url, e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
