pub mod aggregator;
pub mod collectors;
pub mod fetcher;
pub mod metrics;
