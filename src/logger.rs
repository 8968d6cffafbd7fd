//! Logging initialisation.
//!
//! `LoggerManager` validates the logging configuration and installs the
//! global `tracing` subscriber with a console layer and, optionally, a
//! systemd journald layer. `RUST_LOG` takes precedence over the configured
//! level when set.

use std::io;

use thiserror::Error;
use tracing_subscriber::{fmt, fmt::format::FmtSpan, prelude::*, EnvFilter, Layer, Registry};
use validator::{Validate, ValidationErrors};

use crate::{
    config::logger::{ConsoleConfig, LogFormat, LoggerConfig},
    print_info, print_warn,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Logger configuration validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    /// IO error, typically while connecting to the journald socket.
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to install the global subscriber: {0}")]
    InitializationError(String),

    #[error("No logging layers were configured or successfully initialized")]
    NoLayersConfigured,
}

pub struct LoggerManager {
    config: LoggerConfig,
}

impl LoggerManager {
    /// # Errors
    ///
    /// Returns `LoggerError::ValidationError` if configuration validation fails.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        config.validate()?;
        Ok(LoggerManager { config })
    }

    /// Installs the global subscriber. Must be called once, before the
    /// first scrape is served.
    ///
    /// A journald failure is tolerated as long as console output is enabled.
    pub fn init(&self) -> Result<(), LoggerError> {
        let mut layers: Vec<BoxedLayer> = Vec::new();

        if let Some(console) = self.config.console.as_ref().filter(|c| c.enabled) {
            layers.push(console_layer(console, self.filter()));
        }

        if let Some(journald) = self.config.journald.as_ref().filter(|j| j.enabled) {
            match tracing_journald::layer() {
                Ok(layer) => {
                    layers.push(
                        layer
                            .with_syslog_identifier(journald.identifier.clone())
                            .with_filter(self.filter())
                            .boxed(),
                    );
                    print_info!(
                        "Systemd journald logger initialized with identifier: {}",
                        journald.identifier
                    );
                }
                Err(e) => {
                    print_warn!("Failed to initialize systemd journald logger: {}", e);
                    if layers.is_empty() {
                        return Err(LoggerError::IoError(e));
                    }
                }
            }
        }

        if layers.is_empty() {
            return Err(LoggerError::NoLayersConfigured);
        }

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| LoggerError::InitializationError(e.to_string()))
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.config.level))
    }
}

fn console_layer(config: &ConsoleConfig, filter: EnvFilter) -> BoxedLayer {
    let span_events = if config.show_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let base = fmt::layer()
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_span_events(span_events)
        .with_ansi(config.ansi_colors)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Json => base.json().with_filter(filter).boxed(),
        LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
        LogFormat::Compact => base.compact().with_filter(filter).boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::logger::JournaldConfig;

    #[test]
    fn invalid_level_is_rejected_up_front() {
        let config = LoggerConfig {
            level: "shout".into(),
            ..Default::default()
        };
        assert!(matches!(
            LoggerManager::new(config),
            Err(LoggerError::ValidationError(_))
        ));
    }

    #[test]
    fn no_enabled_output_is_an_error() {
        let config = LoggerConfig {
            console: Some(ConsoleConfig {
                enabled: false,
                ..Default::default()
            }),
            journald: Some(JournaldConfig::default()),
            ..Default::default()
        };
        let manager = LoggerManager::new(config).unwrap();
        assert!(matches!(
            manager.init(),
            Err(LoggerError::NoLayersConfigured)
        ));
    }
}
