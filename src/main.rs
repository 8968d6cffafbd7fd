use std::{process, sync::Arc};

use clap::Parser;
use logstash_exporter::{
    config::{cli::Cli, Config},
    core::{
        aggregator::Aggregator, collectors::registry::CollectorRegistry, metrics::ExporterMetrics,
    },
    logger::LoggerManager,
    print_error,
    server::{self, AppState},
};
use tokio::net::TcpListener;
use tracing::{error, info};

fn log_collectors_table(registry: &CollectorRegistry) {
    let names = registry.list_names();
    let width = names
        .iter()
        .map(|s| s.len())
        .max()
        .unwrap_or(0)
        .max("Collector".len());

    info!("{:<width$} | Status", "Collector", width = width);
    info!("{}-+-{}", "-".repeat(width), "-".repeat(12));
    for name in names {
        info!("{:<width$} | ENABLED", name, width = width);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let cfg = Config::new(&cli).unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });

    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });

    info!(
        "Starting logstash_exporter version {}...",
        env!("CARGO_PKG_VERSION")
    );
    info!("Log level: {}", cfg.logger.level);
    info!("Logstash endpoint: {}", cfg.logstash.endpoint);

    let metrics = ExporterMetrics::new().unwrap_or_else(|e| {
        error!("Failed to register exporter metrics: {}", e);
        process::exit(1);
    });
    let registry = CollectorRegistry::new(&cfg.logstash).unwrap_or_else(|e| {
        error!("Failed to create collectors: {}", e);
        process::exit(1);
    });
    log_collectors_table(&registry);

    let aggregator = Aggregator::new(Arc::new(registry), Arc::new(metrics));
    let state = AppState::new(aggregator, &cfg.web.metrics_path);

    let addr = cfg.web.socket_addr().unwrap_or_else(|e| {
        error!("Invalid listen address '{}': {}", cfg.web.listen_address, e);
        process::exit(1);
    });
    let listener = TcpListener::bind(addr).await.unwrap_or_else(|e| {
        error!("Failed to bind {}: {}", addr, e);
        process::exit(1);
    });

    info!(
        "Listening on http://{}{}",
        addr, cfg.web.metrics_path
    );

    if let Err(e) = server::serve(listener, state).await {
        error!("Server error: {}", e);
        process::exit(1);
    }
    info!("Shutdown complete");
}
