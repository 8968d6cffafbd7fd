//! Logging configuration structures and validation logic.
//!
//! These types make up the `[logger]` section of the exporter's TOML file.
//! They are read once at startup, checked with `validator`, and handed to
//! `LoggerManager`, which turns them into `tracing` subscriber layers.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Available formats for console log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Top-level logging configuration.
///
/// Controls the global log level and the output targets (console and/or journald).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggerConfig {
    /// Global log level. Valid values: trace, debug, info, warn, error (case-insensitive).
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,

    /// Optional console output configuration. Enabled by default.
    #[validate(nested)]
    pub console: Option<ConsoleConfig>,

    /// Optional systemd journald output. Absent by default.
    #[validate(nested)]
    pub journald: Option<JournaldConfig>,
}

/// Validates that the provided log level is one of the supported values.
pub(crate) fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_log_level");
            err.message = Some(format!("Invalid log level: {}", level).into());
            Err(err)
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: "info".to_string(),
            console: Some(ConsoleConfig::default()),
            journald: None,
        }
    }
}

/// Configuration for console log output.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Whether console output is enabled.
    pub enabled: bool,

    /// Output format for console logs.
    pub format: LogFormat,

    /// Include the log target (module path) in output.
    pub show_target: bool,

    /// Include thread IDs in output.
    pub show_thread_ids: bool,

    /// Include span close events (with their timing) in output.
    pub show_spans: bool,

    /// Enable ANSI color codes. Turn off when stdout goes to a file.
    pub ansi_colors: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            enabled: true,
            format: LogFormat::default(),
            show_target: false,
            show_thread_ids: false,
            show_spans: false,
            ansi_colors: true,
        }
    }
}

/// Configuration for systemd journald output (Unix only).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JournaldConfig {
    /// Whether journald output is enabled.
    #[serde(default)]
    pub enabled: bool,

    /// `SYSLOG_IDENTIFIER` of the journal entries. Must be non-empty.
    #[validate(length(min = 1))]
    pub identifier: String,
}

impl Default for JournaldConfig {
    fn default() -> Self {
        JournaldConfig {
            enabled: false,
            identifier: "logstash_exporter".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_is_case_insensitive() {
        for level in ["trace", "DEBUG", "Info", "warn", "error"] {
            assert!(validate_log_level(level).is_ok(), "{} should be valid", level);
        }
        assert!(validate_log_level("verbose").is_err());
    }

    #[test]
    fn defaults_log_to_console_only() {
        let config = LoggerConfig::default();
        let console = config.console.as_ref().unwrap();
        assert!(console.enabled);
        assert!(console.ansi_colors);
        assert_eq!(console.format, LogFormat::Compact);
        assert!(config.journald.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn formats_deserialize_lowercase() {
        let console: ConsoleConfig = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(console.format, LogFormat::Json);
        assert!(console.enabled);
    }

    #[test]
    fn empty_journald_identifier_is_invalid() {
        let config = LoggerConfig {
            journald: Some(JournaldConfig {
                enabled: true,
                identifier: String::new(),
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
