//! Concurrent scrape aggregation.
//!
//! On every scrape the `Aggregator` spawns one task per registered collector,
//! waits for all of them, records a duration/result observation per
//! collector and hands back everything the collectors wrote. Each cycle owns
//! its output channel and its task handles, so overlapping scrapes never
//! share state other than the read-only registry and the meta-metrics.

use std::{fmt, sync::Arc};

use tokio::{
    sync::mpsc,
    time::{Duration, Instant},
};
use tracing::{debug, error, warn};

use super::{
    collectors::{
        error::CollectorError,
        registry::CollectorRegistry,
        types::{CollectorResult, Sample, SampleReceiver, SampleSender},
    },
    metrics::ExporterMetrics,
};

/// Result tag of one collector run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrapeResult {
    Success,
    Error,
}

impl ScrapeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeResult::Success => "success",
            ScrapeResult::Error => "error",
        }
    }
}

impl fmt::Display for ScrapeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one collector during one scrape cycle.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub collector: &'static str,
    pub duration: Duration,
    pub result: ScrapeResult,
    /// Samples the collector wrote to the output stream.
    pub samples: usize,
}

impl ScrapeOutcome {
    fn from_result(collector: &'static str, duration: Duration, result: &CollectorResult<usize>) -> Self {
        match result {
            Ok(samples) => Self {
                collector,
                duration,
                result: ScrapeResult::Success,
                samples: *samples,
            },
            Err(_) => Self {
                collector,
                duration,
                result: ScrapeResult::Error,
                samples: 0,
            },
        }
    }
}

/// Everything one scrape cycle produced.
#[derive(Debug, Default)]
pub struct Scrape {
    /// Domain samples; per-collector write order is preserved.
    pub samples: Vec<Sample>,
    /// Exactly one entry per registered collector.
    pub outcomes: Vec<ScrapeOutcome>,
    /// Wall time of the whole cycle.
    pub duration: Duration,
}

impl Scrape {
    pub fn outcome(&self, collector: &str) -> Option<&ScrapeOutcome> {
        self.outcomes.iter().find(|o| o.collector == collector)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScrapeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.result == ScrapeResult::Error)
    }
}

/// Runs all registered collectors concurrently, once per scrape.
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<CollectorRegistry>,
    metrics: Arc<ExporterMetrics>,
}

impl Aggregator {
    pub fn new(registry: Arc<CollectorRegistry>, metrics: Arc<ExporterMetrics>) -> Self {
        Self { registry, metrics }
    }

    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }

    /// Runs one scrape cycle.
    ///
    /// Never fails: a collector error only flips that collector's result tag
    /// to `error`. There is no deadline here; each collector is bounded by
    /// its own HTTP timeout.
    pub async fn run_scrape_cycle(&self) -> Scrape {
        let start = Instant::now();
        let (output, mut stream): (SampleSender, SampleReceiver) = mpsc::unbounded_channel();

        // Spawn tasks for each registered collector
        let tasks: Vec<_> = self
            .registry
            .iter()
            .map(|(name, collector)| {
                let collector = Arc::clone(collector);
                let output = output.clone();
                let metrics = Arc::clone(&self.metrics);
                let spawned = Instant::now();
                let task = tokio::spawn(async move {
                    let begin = Instant::now();
                    // A panic surfaces here, timed from this collector's own start
                    let run = tokio::spawn(async move { collector.collect(&output).await });
                    let result = match run.await {
                        Ok(result) => result,
                        Err(e) => Err(CollectorError::Panicked {
                            collector: name.to_string(),
                            reason: e.to_string(),
                        }),
                    };
                    let outcome = ScrapeOutcome::from_result(name, begin.elapsed(), &result);

                    match &result {
                        Ok(count) => debug!(
                            "Collector '{}' wrote {} samples in {:?}",
                            name, count, outcome.duration
                        ),
                        Err(e @ CollectorError::Panicked { .. }) => {
                            error!("{} after {:?}", e, outcome.duration)
                        }
                        Err(e) => warn!(
                            "Collector '{}' failed after {:?}: {}",
                            name,
                            outcome.duration,
                            e.chain()
                        ),
                    }

                    metrics.observe(&outcome);
                    outcome
                });
                (name, spawned, task)
            })
            .collect();

        // Only the collector tasks may hold senders from here on
        drop(output);

        // Wait for all collection tasks to complete
        let mut outcomes = Vec::with_capacity(tasks.len());
        for (name, spawned, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Scrape task of collector '{}' aborted: {}", name, e);
                    let outcome = ScrapeOutcome {
                        collector: name,
                        duration: spawned.elapsed(),
                        result: ScrapeResult::Error,
                        samples: 0,
                    };
                    self.metrics.observe(&outcome);
                    outcome
                }
            };
            outcomes.push(outcome);
        }

        // Every sender is gone, so this drains and terminates
        let mut samples = Vec::new();
        while let Some(sample) = stream.recv().await {
            samples.push(sample);
        }

        let scrape = Scrape {
            samples,
            outcomes,
            duration: start.elapsed(),
        };
        debug!(
            "Scrape finished in {:?}: {} samples, {} of {} collectors failed",
            scrape.duration,
            scrape.samples.len(),
            scrape.failed().count(),
            scrape.outcomes.len()
        );
        scrape
    }
}
