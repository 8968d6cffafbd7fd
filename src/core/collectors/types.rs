use tokio::sync::mpsc;

use super::error::CollectorError;

/// Result type used throughout the collector system.
pub type CollectorResult<T> = std::result::Result<T, CollectorError>;

/// Write half of the per-scrape output stream.
///
/// Every sample travels as one message, so concurrent writers can never
/// interleave the fields of two samples.
pub type SampleSender = mpsc::UnboundedSender<Sample>;

/// Read half of the per-scrape output stream, owned by the aggregator.
pub type SampleReceiver = mpsc::UnboundedReceiver<Sample>;

/// How a sample is exposed to the monitoring backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Gauge,
    Counter,
}

/// One metric sample: a name, an ordered label set and a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub help: &'static str,
    pub kind: SampleKind,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Sample {
    pub fn gauge(name: impl Into<String>, help: &'static str, value: f64) -> Self {
        Self {
            name: name.into(),
            help,
            kind: SampleKind::Gauge,
            labels: Vec::new(),
            value,
        }
    }

    pub fn counter(name: impl Into<String>, help: &'static str, value: f64) -> Self {
        Self {
            kind: SampleKind::Counter,
            ..Self::gauge(name, help, value)
        }
    }

    /// Appends a label, keeping insertion order.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Label keys in order, used to build the metric vector for this name.
    pub fn label_keys(&self) -> Vec<&str> {
        self.labels.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Identity of the series inside one scrape: name plus label set.
    pub fn series_key(&self) -> (String, Vec<(String, String)>) {
        (self.name.clone(), self.labels.clone())
    }
}

/// Builds fully qualified metric names the way Prometheus client libraries do:
/// `namespace_subsystem_name`.
pub fn metric_name(namespace: &str, subsystem: &str, name: &str) -> String {
    format!("{}_{}_{}", namespace, subsystem, name)
}
