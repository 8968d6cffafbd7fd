//! Settings for the Logstash side (what to scrape) and the web side (where
//! to expose the result).

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Where the Logstash monitoring API lives.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LogstashConfig {
    /// Protocol, host and port of the Logstash monitoring API.
    #[validate(url(message = "Logstash endpoint must be a valid URL"))]
    pub endpoint: String,

    /// Timeout of a single API request in milliseconds.
    #[validate(range(min = 1, message = "Timeout must be at least 1 millisecond"))]
    pub timeout_ms: u64,
}

impl Default for LogstashConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9600".to_string(),
            timeout_ms: 5000,
        }
    }
}

/// Exposition server settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WebConfig {
    /// Address to listen on. `:PORT` listens on all interfaces.
    #[validate(custom(function = "validate_listen_address"))]
    pub listen_address: String,

    /// Path under which metrics are exposed.
    #[validate(custom(function = "validate_metrics_path"))]
    pub metrics_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: ":9198".to_string(),
            metrics_path: "/metrics".to_string(),
        }
    }
}

impl WebConfig {
    /// Resolves `listen_address` into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        parse_listen_address(&self.listen_address)
    }
}

fn parse_listen_address(address: &str) -> Result<SocketAddr, std::net::AddrParseError> {
    if address.starts_with(':') {
        format!("0.0.0.0{}", address).parse()
    } else {
        address.parse()
    }
}

fn validate_listen_address(address: &str) -> Result<(), ValidationError> {
    parse_listen_address(address).map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("invalid_listen_address");
        err.message = Some(format!("Invalid listen address '{}': {}", address, e).into());
        err
    })
}

fn validate_metrics_path(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') && path.len() > 1 {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_metrics_path");
        err.message = Some(format!("Metrics path must start with '/': {}", path).into());
        Err(err)
    }
}
