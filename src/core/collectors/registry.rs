use std::{collections::BTreeMap, sync::Arc, time::Duration};

use reqwest::Client;
use tracing::debug;

use super::{
    error::RegistrationError,
    node_info::{self, NodeInfoCollector},
    node_stats::{self, NodeStatsCollector},
    traits::{DataProducer, IntoSamples},
    types::{CollectorResult, SampleSender},
};
use crate::{config::exporter::LogstashConfig, core::fetcher::Fetcher};

/// A trait object that all collectors must implement.
/// It allows us to store different collector types uniformly in the registry
/// while still being able to call them dynamically at runtime.
#[async_trait::async_trait]
pub trait DynCollector: Send + Sync {
    /// Unique name of the collector, used as the `collector` label of the
    /// scrape duration meta-metric.
    fn name(&self) -> &'static str;

    /// Runs one collection and writes the resulting samples to `output`.
    ///
    /// Returns the number of samples written. A variant writes either all of
    /// its samples or none of them.
    async fn collect(&self, output: &SampleSender) -> CollectorResult<usize>;
}

/// Turns any `DataProducer` into a `DynCollector`.
pub struct DynWrapper<T> {
    inner: T,
    name: &'static str,
}

impl<T> DynWrapper<T> {
    pub fn new(name: &'static str, inner: T) -> Self {
        Self { name, inner }
    }
}

#[async_trait::async_trait]
impl<T> DynCollector for DynWrapper<T>
where
    T: DataProducer,
{
    fn name(&self) -> &'static str {
        self.name
    }

    /// Fetches and converts the payload first, then sends; a fetch or decode
    /// failure therefore leaves nothing behind in the output stream.
    async fn collect(&self, output: &SampleSender) -> CollectorResult<usize> {
        let samples = self.inner.produce().await?.into_samples();
        let total = samples.len();
        let mut sent = 0;

        for sample in samples {
            // The receiver lives until every collector of the cycle returned
            if output.send(sample).is_err() {
                debug!(
                    "Output stream of '{}' closed after {} of {} samples",
                    self.name, sent, total
                );
                break;
            }
            sent += 1;
        }

        Ok(sent)
    }
}

/// The set of collectors run on every scrape.
///
/// Built once at startup and never mutated afterwards, so it can be shared
/// between concurrent scrape cycles without locking.
pub struct CollectorRegistry {
    collectors: BTreeMap<&'static str, Arc<dyn DynCollector>>,
}

impl CollectorRegistry {
    /// Builds the standard Logstash collectors against the configured endpoint.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built or the endpoint is not a
    /// valid http(s) URL. Callers are expected to abort startup.
    pub fn new(config: &LogstashConfig) -> Result<Self, RegistrationError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("logstash_exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let node_stats = NodeStatsCollector::new(Fetcher::new(
            client.clone(),
            &config.endpoint,
            node_stats::PATH,
        )?);
        let node_info =
            NodeInfoCollector::new(Fetcher::new(client, &config.endpoint, node_info::PATH)?);

        Self::from_collectors(vec![
            Arc::new(DynWrapper::new(node_stats::NAME, node_stats)),
            Arc::new(DynWrapper::new(node_info::NAME, node_info)),
        ])
    }

    /// Builds a registry from an explicit collector list.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::DuplicateCollector` if two collectors share a name.
    pub fn from_collectors(
        collectors: Vec<Arc<dyn DynCollector>>,
    ) -> Result<Self, RegistrationError> {
        let mut map = BTreeMap::new();
        for collector in collectors {
            let name = collector.name();
            if map.insert(name, collector).is_some() {
                return Err(RegistrationError::DuplicateCollector(name.to_string()));
            }
        }
        Ok(Self { collectors: map })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynCollector>> {
        self.collectors.get(name).cloned()
    }

    /// Registered collector names, sorted.
    pub fn list_names(&self) -> Vec<&'static str> {
        self.collectors.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collectors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn DynCollector>)> {
        self.collectors.iter().map(|(name, c)| (*name, c))
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::core::collectors::{error::CollectorError, types::Sample};

    struct Payload(Vec<f64>);

    impl IntoSamples for Payload {
        fn into_samples(self) -> Vec<Sample> {
            self.0
                .into_iter()
                .enumerate()
                .map(|(i, v)| Sample::gauge(format!("test_value_{}", i), "test", v))
                .collect()
        }
    }

    struct StaticProducer(Vec<f64>);

    #[async_trait::async_trait]
    impl DataProducer for StaticProducer {
        type Output = Payload;

        async fn produce(&self) -> CollectorResult<Payload> {
            Ok(Payload(self.0.clone()))
        }
    }

    struct FailingProducer;

    #[async_trait::async_trait]
    impl DataProducer for FailingProducer {
        type Output = Payload;

        async fn produce(&self) -> CollectorResult<Payload> {
            Err(CollectorError::Status {
                url: "http://logstash.test/_node/stats".into(),
                status: reqwest::StatusCode::BAD_GATEWAY,
            })
        }
    }

    fn config(endpoint: &str) -> LogstashConfig {
        LogstashConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn new_registers_node_and_info() {
        let registry = CollectorRegistry::new(&config("http://localhost:9600")).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
        assert_eq!(registry.list_names(), vec!["info", "node"]);
        assert_eq!(registry.get("node").unwrap().name(), "node");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn new_fails_fast_on_malformed_endpoint() {
        let result = CollectorRegistry::new(&config("localhost 9600"));
        assert!(matches!(
            result,
            Err(RegistrationError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = CollectorRegistry::from_collectors(vec![
            Arc::new(DynWrapper::new("dup", StaticProducer(vec![1.0]))),
            Arc::new(DynWrapper::new("dup", StaticProducer(vec![2.0]))),
        ]);
        assert!(matches!(
            result,
            Err(RegistrationError::DuplicateCollector(name)) if name == "dup"
        ));
    }

    #[tokio::test]
    async fn wrapper_writes_all_samples_in_order() {
        let wrapper = DynWrapper::new("static", StaticProducer(vec![1.0, 2.0, 3.0]));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let written = wrapper.collect(&tx).await.unwrap();
        drop(tx);

        let mut values = Vec::new();
        while let Some(sample) = rx.recv().await {
            values.push(sample.value);
        }
        assert_eq!(written, 3);
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn wrapper_writes_nothing_on_failure() {
        let wrapper = DynWrapper::new("failing", FailingProducer);
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(wrapper.collect(&tx).await.is_err());
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn wrapper_counts_only_delivered_samples() {
        let wrapper = DynWrapper::new("static", StaticProducer(vec![1.0, 2.0, 3.0]));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        assert_eq!(wrapper.collect(&tx).await.unwrap(), 0);
    }
}
