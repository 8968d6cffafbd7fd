use thiserror::Error;

/// Errors a collector can hit during one scrape cycle.
///
/// None of these are fatal: the aggregator turns every one of them into the
/// `error` result tag of the scrape duration meta-metric.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// The remote endpoint could not be reached or the body could not be read
    /// (connection refused, timeout, DNS failure).
    #[error("Failed to fetch {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success HTTP status.
    #[error("Unexpected HTTP status {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The body was not valid JSON or did not match the expected schema.
    #[error("Failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The collector task aborted before returning.
    #[error("Collector '{collector}' panicked: {reason}")]
    Panicked { collector: String, reason: String },
}

/// Errors raised while building the collector set at startup.
///
/// Unlike [`CollectorError`] these are always fatal: the process must not run
/// with a partially initialised registry.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// The configured Logstash endpoint is not a usable http(s) URL.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Two collectors were registered under the same name.
    #[error("Collector '{0}' is registered more than once")]
    DuplicateCollector(String),

    /// The shared HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// A meta-metric could not be registered.
    #[error("Failed to register exporter metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl CollectorError {
    /// Walks the source chain so the log line shows the root cause
    /// (e.g. "connection refused") and not only the outer message.
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
