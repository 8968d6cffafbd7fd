//! Application configuration loading, validation, and management.
//!
//! The top-level `Config` aggregates logging, Logstash and web settings. It
//! is resolved once at startup from a TOML file (or built-in defaults),
//! overridden by command-line flags, validated, and never mutated afterwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{
    cli::Cli,
    exporter::{LogstashConfig, WebConfig},
    logger::LoggerConfig,
};

pub mod cli;
pub mod exporter;
pub mod logger;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "LOGSTASH_EXPORTER_CONFIG";

/// Configuration file used when neither the flag nor the variable is set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/logstash_exporter/config.toml";

#[doc(hidden)]
#[macro_export]
macro_rules! __print_line {
    ($level:expr, $($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            ).dim(),
            $level,
            format_args!($($arg)*)
        );
    };
}

/// Timestamped output for use before the tracing subscriber is installed.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => { $crate::__print_line!(console::style("INFO").green(), $($arg)*) };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => { $crate::__print_line!(console::style("WARN").yellow(), $($arg)*) };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => { $crate::__print_line!(console::style("ERROR").red(), $($arg)*) };
}

/// Errors that can occur during configuration loading, parsing or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Remote Logstash API settings.
    #[validate(nested)]
    pub logstash: LogstashConfig,

    /// Exposition server settings.
    #[validate(nested)]
    pub web: WebConfig,
}

impl Config {
    /// Resolves the configuration for this process: file (if any), then
    /// command-line overrides, then validation.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if an explicitly named file is missing, or if
    /// the file cannot be read, parsed, or validated.
    pub fn new(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match Self::get_config_path(cli)? {
            Some(path) => Self::read(&path)?,
            None => {
                print_warn!("No configuration file found, using defaults");
                Config::default()
            }
        };

        config.apply_cli(cli);
        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(config)
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `--config` flag
    /// 2. `LOGSTASH_EXPORTER_CONFIG` environment variable
    /// 3. `/etc/logstash_exporter/config.toml`, if it exists
    fn get_config_path(cli: &Cli) -> Result<Option<PathBuf>, ConfigError> {
        let explicit = cli
            .config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            print_info!("Using config from: {}", path.display());
            return Ok(Some(path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(Some(fallback.to_path_buf()));
        }

        Ok(None)
    }

    /// Loads and validates configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let config = Self::read(path)?;
        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Overrides file values with the flags that were given.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(endpoint) = &cli.logstash_endpoint {
            self.logstash.endpoint = endpoint.clone();
        }
        if let Some(address) = &cli.listen_address {
            self.web.listen_address = address.clone();
        }
        if let Some(path) = &cli.metrics_path {
            self.web.metrics_path = path.clone();
        }
        if let Some(level) = &cli.log_level {
            self.logger.level = level.clone();
        }
    }
}
