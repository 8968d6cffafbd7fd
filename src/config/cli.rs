//! Command-line flags. Every flag is optional and, when given, overrides the
//! corresponding value of the configuration file.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "logstash_exporter", version, about = "Prometheus exporter for Logstash")]
pub struct Cli {
    /// Path of the TOML configuration file.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// The protocol, host and port on which the Logstash metrics API listens.
    #[arg(long = "logstash.endpoint", value_name = "URL")]
    pub logstash_endpoint: Option<String>,

    /// Address on which to expose metrics and web interface.
    #[arg(long = "web.listen-address", value_name = "ADDRESS")]
    pub listen_address: Option<String>,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path", value_name = "PATH")]
    pub metrics_path: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log.level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}
