//! Exporter meta-metrics and the bridge to the Prometheus text format.
//!
//! `ExporterMetrics` owns an explicit `prometheus::Registry` created once at
//! startup. It holds the metrics that outlive a single scrape (scrape
//! durations, build info). Domain samples are per-scrape: `render` loads
//! them into a throwaway registry and encodes both together.

use std::collections::{hash_map::Entry, HashMap, HashSet};

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

use super::{
    aggregator::ScrapeOutcome,
    collectors::{
        error::RegistrationError,
        types::{Sample, SampleKind},
    },
};

pub const NAMESPACE: &str = "logstash";
pub const SUBSYSTEM: &str = "exporter";

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Metrics describing the exporter itself.
pub struct ExporterMetrics {
    registry: Registry,
    scrape_duration: HistogramVec,
}

impl ExporterMetrics {
    /// Creates the registry and registers all exporter metrics.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::Metrics` if a metric definition is rejected.
    pub fn new() -> Result<Self, RegistrationError> {
        let registry = Registry::new();

        let scrape_duration = HistogramVec::new(
            HistogramOpts::new(
                "scrape_duration_seconds",
                "logstash_exporter: Duration of a scrape job.",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
            &["collector", "result"],
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;

        let build_info = IntGaugeVec::new(
            Opts::new(
                "build_info",
                "A metric with a constant '1' value labeled by version from which logstash_exporter was built.",
            )
            .namespace("logstash_exporter"),
            &["version"],
        )?;
        build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1);
        registry.register(Box::new(build_info))?;

        Ok(Self {
            registry,
            scrape_duration,
        })
    }

    /// Records one collector run of one scrape cycle.
    pub fn observe(&self, outcome: &ScrapeOutcome) {
        self.scrape_duration
            .with_label_values(&[outcome.collector, outcome.result.as_str()])
            .observe(outcome.duration.as_secs_f64());
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scrape_duration(&self) -> &HistogramVec {
        &self.scrape_duration
    }

    /// Encodes the samples of one scrape together with the exporter metrics.
    ///
    /// Samples that cannot be represented (duplicate series, a name used
    /// with two kinds or two label sets, negative counters) are dropped
    /// with a warning; the first sample of a series wins.
    pub fn render(&self, samples: &[Sample]) -> Result<String, prometheus::Error> {
        let mut scrape = ScrapeFamilies::new();
        let mut seen = HashSet::with_capacity(samples.len());

        for sample in samples {
            if !seen.insert(sample.series_key()) {
                warn!(
                    "Duplicate series {}{:?} in one scrape, keeping the first value",
                    sample.name, sample.labels
                );
                continue;
            }
            if let Err(e) = scrape.record(sample) {
                warn!("Dropping sample '{}': {}", sample.name, e);
            }
        }

        let mut families = scrape.registry.gather();
        families.extend(self.registry.gather());
        families.sort_by(|a, b| a.get_name().cmp(b.get_name()));

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

struct FamilyEntry {
    label_keys: Vec<String>,
    family: Family,
}

/// Metric vectors for the domain samples of one scrape.
struct ScrapeFamilies {
    registry: Registry,
    families: HashMap<String, FamilyEntry>,
}

impl ScrapeFamilies {
    fn new() -> Self {
        Self {
            registry: Registry::new(),
            families: HashMap::new(),
        }
    }

    fn record(&mut self, sample: &Sample) -> Result<(), prometheus::Error> {
        let entry = match self.families.entry(sample.name.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let opts = Opts::new(sample.name.clone(), sample.help);
                let keys = sample.label_keys();
                let family = match sample.kind {
                    SampleKind::Gauge => {
                        let vec = GaugeVec::new(opts, &keys)?;
                        self.registry.register(Box::new(vec.clone()))?;
                        Family::Gauge(vec)
                    }
                    SampleKind::Counter => {
                        let vec = CounterVec::new(opts, &keys)?;
                        self.registry.register(Box::new(vec.clone()))?;
                        Family::Counter(vec)
                    }
                };
                e.insert(FamilyEntry {
                    label_keys: keys.iter().map(|k| k.to_string()).collect(),
                    family,
                })
            }
        };

        if entry
            .label_keys
            .iter()
            .map(String::as_str)
            .ne(sample.labels.iter().map(|(k, _)| k.as_str()))
        {
            return Err(prometheus::Error::Msg(format!(
                "label names {:?} differ from {:?}",
                sample.label_keys(),
                entry.label_keys
            )));
        }

        let values: Vec<&str> = sample.labels.iter().map(|(_, v)| v.as_str()).collect();
        match (&entry.family, sample.kind) {
            (Family::Gauge(vec), SampleKind::Gauge) => {
                vec.get_metric_with_label_values(&values)?.set(sample.value);
            }
            (Family::Counter(vec), SampleKind::Counter) => {
                if sample.value < 0.0 {
                    return Err(prometheus::Error::Msg(format!(
                        "negative counter value {}",
                        sample.value
                    )));
                }
                vec.get_metric_with_label_values(&values)?.inc_by(sample.value);
            }
            _ => {
                return Err(prometheus::Error::Msg(
                    "name already used with a different metric type".to_string(),
                ))
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tracing_test::traced_test;

    use super::*;
    use crate::core::aggregator::ScrapeResult;

    fn outcome(collector: &'static str, result: ScrapeResult, millis: u64) -> ScrapeOutcome {
        ScrapeOutcome {
            collector,
            duration: Duration::from_millis(millis),
            result,
            samples: 0,
        }
    }

    #[test]
    fn observe_records_per_collector_and_result() {
        let metrics = ExporterMetrics::new().unwrap();
        metrics.observe(&outcome("node", ScrapeResult::Success, 10));
        metrics.observe(&outcome("node", ScrapeResult::Error, 20));
        metrics.observe(&outcome("node", ScrapeResult::Success, 30));

        let success = metrics
            .scrape_duration()
            .with_label_values(&["node", "success"]);
        let error = metrics
            .scrape_duration()
            .with_label_values(&["node", "error"]);
        assert_eq!(success.get_sample_count(), 2);
        assert_eq!(error.get_sample_count(), 1);
        assert!((success.get_sample_sum() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn render_includes_domain_and_meta_metrics() {
        let metrics = ExporterMetrics::new().unwrap();
        metrics.observe(&outcome("info", ScrapeResult::Success, 5));

        let samples = vec![
            Sample::gauge("logstash_node_jvm_threads_count", "threads", 41.0),
            Sample::counter("logstash_node_pipeline_events_in_total", "in", 100.0)
                .with_label("pipeline", "main"),
        ];
        let text = metrics.render(&samples).unwrap();

        assert!(text.contains("# TYPE logstash_node_jvm_threads_count gauge"));
        assert!(text.contains("logstash_node_jvm_threads_count 41\n"));
        assert!(text.contains("# TYPE logstash_node_pipeline_events_in_total counter"));
        assert!(text.contains("logstash_node_pipeline_events_in_total{pipeline=\"main\"} 100\n"));
        assert!(text.contains(
            "logstash_exporter_scrape_duration_seconds_count{collector=\"info\",result=\"success\"} 1\n"
        ));
        assert!(text.contains(&format!(
            "logstash_exporter_build_info{{version=\"{}\"}} 1",
            env!("CARGO_PKG_VERSION")
        )));
    }

    #[test]
    fn render_does_not_keep_samples_between_scrapes() {
        let metrics = ExporterMetrics::new().unwrap();

        let first = metrics
            .render(&[Sample::gauge("logstash_info_os_available_processors", "cpus", 8.0)])
            .unwrap();
        let second = metrics.render(&[]).unwrap();

        assert!(first.contains("logstash_info_os_available_processors 8"));
        assert!(!second.contains("logstash_info_os_available_processors"));
    }

    #[test]
    #[traced_test]
    fn render_keeps_first_duplicate_series() {
        let metrics = ExporterMetrics::new().unwrap();
        let samples = vec![
            Sample::gauge("dup_metric", "dup", 1.0).with_label("pipeline", "main"),
            Sample::gauge("dup_metric", "dup", 2.0).with_label("pipeline", "main"),
            Sample::gauge("dup_metric", "dup", 3.0).with_label("pipeline", "other"),
        ];

        let text = metrics.render(&samples).unwrap();
        assert!(text.contains("dup_metric{pipeline=\"main\"} 1\n"));
        assert!(text.contains("dup_metric{pipeline=\"other\"} 3\n"));
        assert!(!text.contains("dup_metric{pipeline=\"main\"} 2"));
        assert!(logs_contain("Duplicate series dup_metric"));
    }

    #[test]
    #[traced_test]
    fn render_drops_inconsistent_samples() {
        let metrics = ExporterMetrics::new().unwrap();
        let samples = vec![
            Sample::gauge("mixed_metric", "mixed", 1.0),
            Sample::counter("mixed_metric", "mixed", 2.0).with_label("a", "b"),
            Sample::gauge("labelled_metric", "l", 1.0).with_label("pipeline", "main"),
            Sample::gauge("labelled_metric", "l", 2.0).with_label("plugin", "grok"),
            Sample::counter("negative_total", "n", -1.0),
        ];

        let text = metrics.render(&samples).unwrap();
        assert!(text.contains("mixed_metric 1\n"));
        assert!(text.contains("labelled_metric{pipeline=\"main\"} 1\n"));
        assert!(!text.contains("plugin=\"grok\""));
        assert!(!text.contains("negative_total -1"));
        assert!(logs_contain("Dropping sample 'mixed_metric'"));
        assert!(logs_contain("Dropping sample 'negative_total'"));
    }
}
