use super::types::{CollectorResult, Sample};

/// A core trait that every Logstash collector must implement.
///
/// `DataProducer` fetches one typed payload from the monitoring API. The
/// payload type is the compile-time schema of the JSON document, so shape
/// mismatches surface as decode errors instead of silently missing values.
#[async_trait::async_trait]
pub trait DataProducer: Send + Sync + 'static {
    /// The decoded response document.
    type Output: IntoSamples + Send + Sync + 'static;

    /// Performs the HTTP request(s) and returns the decoded document.
    async fn produce(&self) -> CollectorResult<Self::Output>;
}

/// Converts a decoded payload into the metric samples it exposes.
///
/// Conversion is infallible: everything that can go wrong has already
/// happened while fetching and decoding.
pub trait IntoSamples {
    fn into_samples(self) -> Vec<Sample>;
}
