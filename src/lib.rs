//! logstash_exporter: Prometheus exporter for the Logstash monitoring API
//!
//! On every scrape the exporter queries a Logstash node concurrently through
//! a set of collectors and republishes the values in the Prometheus text
//! exposition format, together with per-collector scrape duration and
//! success/error meta-metrics.
//!
//! ## Modules
//!
//! * `config`: TOML configuration, command-line overrides and validation.
//!
//! * `core`: The scrape engine:
//!   - HTTP fetcher decoding typed JSON documents
//!   - Collector trait, registry and the `node` / `info` collectors
//!   - Aggregator running all collectors concurrently per scrape
//!   - Exporter meta-metrics and text encoding
//!
//! * `logger`: `tracing` subscriber setup (console formats, journald).
//!
//! * `server`: `axum` exposition endpoint.

pub mod config;
pub mod core;
pub mod logger;
pub mod server;
