//! Node runtime statistics collector (`GET /_node/stats`).
//!
//! Exposes JVM, process and pipeline counters under `logstash_node_*`.
//! Logstash 5.x reports a single `pipeline` object, 6.x and later a
//! `pipelines` map keyed by pipeline id; both shapes are accepted.

use std::collections::BTreeMap;

use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::warn;

use super::{
    traits::{DataProducer, IntoSamples},
    types::{metric_name, CollectorResult, Sample},
};
use crate::core::fetcher::Fetcher;

pub const NAME: &str = "node";
pub const PATH: &str = "/_node/stats";

const NAMESPACE: &str = "logstash";
const SUBSYSTEM: &str = "node";

/// Pipeline id used when a 5.x document does not carry one.
const DEFAULT_PIPELINE: &str = "main";

// ============================================================================
// RESPONSE SCHEMA
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeStatsResponse {
    pub id: String,
    pub name: String,
    pub version: String,
    pub jvm: JvmStats,
    pub process: ProcessStats,
    pub pipeline: Option<PipelineStats>,
    pub pipelines: BTreeMap<String, PipelineStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JvmStats {
    pub threads: ThreadStats,
    pub mem: MemStats,
    pub gc: GcStats,
    pub uptime_in_millis: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThreadStats {
    pub count: u64,
    pub peak_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemStats {
    pub heap_used_percent: f64,
    pub heap_committed_in_bytes: u64,
    pub heap_max_in_bytes: u64,
    pub heap_used_in_bytes: u64,
    pub non_heap_used_in_bytes: u64,
    pub non_heap_committed_in_bytes: u64,
    pub pools: BTreeMap<String, MemPoolStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemPoolStats {
    pub used_in_bytes: u64,
    pub peak_used_in_bytes: u64,
    pub max_in_bytes: i64,
    pub peak_max_in_bytes: i64,
    pub committed_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GcStats {
    pub collectors: BTreeMap<String, GcCollectorStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GcCollectorStats {
    pub collection_time_in_millis: u64,
    pub collection_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessStats {
    pub open_file_descriptors: u64,
    pub peak_open_file_descriptors: u64,
    pub max_file_descriptors: u64,
    pub mem: ProcessMemStats,
    pub cpu: ProcessCpuStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessMemStats {
    pub total_virtual_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessCpuStats {
    pub total_in_millis: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineStats {
    pub id: Option<String>,
    pub events: EventStats,
    pub plugins: PluginGroups,
    pub reloads: ReloadStats,
    pub queue: Option<QueueStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventStats {
    #[serde(rename = "in")]
    pub events_in: u64,
    pub filtered: u64,
    #[serde(rename = "out")]
    pub events_out: u64,
    pub duration_in_millis: u64,
    pub queue_push_duration_in_millis: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginGroups {
    pub inputs: Vec<PluginStats>,
    pub filters: Vec<PluginStats>,
    pub outputs: Vec<PluginStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginStats {
    pub id: String,
    pub name: String,
    pub events: PluginEventStats,
    pub matches: Option<u64>,
    pub failures: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginEventStats {
    #[serde(rename = "in")]
    pub events_in: u64,
    #[serde(rename = "out")]
    pub events_out: u64,
    pub duration_in_millis: u64,
    pub queue_push_duration_in_millis: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReloadStats {
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<serde_json::Value>,
    pub last_success_timestamp: Option<String>,
    pub last_failure_timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    #[serde(rename = "type")]
    pub queue_type: String,
    pub events: u64,
    pub events_count: Option<u64>,
    pub queue_size_in_bytes: Option<u64>,
    pub max_queue_size_in_bytes: Option<u64>,
}

impl NodeStatsResponse {
    /// Pipelines keyed by id, merging both document shapes.
    pub fn pipelines(&self) -> BTreeMap<String, &PipelineStats> {
        let mut pipelines: BTreeMap<String, &PipelineStats> =
            self.pipelines.iter().map(|(id, p)| (id.clone(), p)).collect();

        if let Some(single) = &self.pipeline {
            let id = single
                .id
                .clone()
                .unwrap_or_else(|| DEFAULT_PIPELINE.to_string());
            pipelines.entry(id).or_insert(single);
        }

        pipelines
    }
}

impl ReloadStats {
    /// A pipeline is considered up unless its most recent reload failed.
    ///
    /// Timestamps are compared as instants. A value that is not valid
    /// RFC 3339 counts as absent.
    fn is_up(&self) -> bool {
        let success = parse_timestamp(self.last_success_timestamp.as_deref());
        let failure = parse_timestamp(self.last_failure_timestamp.as_deref());
        match (success, failure) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(success), Some(failure)) => success >= failure,
        }
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<OffsetDateTime> {
    let value = value?;
    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring unparsable reload timestamp '{}': {}", value, e);
            None
        }
    }
}

// ============================================================================
// SAMPLE CONVERSION
// ============================================================================

fn name(metric: &str) -> String {
    metric_name(NAMESPACE, SUBSYSTEM, metric)
}

fn millis_to_seconds(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

impl IntoSamples for NodeStatsResponse {
    fn into_samples(self) -> Vec<Sample> {
        let mut samples = Vec::new();
        let jvm = &self.jvm;
        let mem = &jvm.mem;

        samples.push(Sample::gauge(
            name("jvm_threads_count"),
            "Number of live JVM threads.",
            jvm.threads.count as f64,
        ));
        samples.push(Sample::gauge(
            name("jvm_threads_peak_count"),
            "Peak number of live JVM threads.",
            jvm.threads.peak_count as f64,
        ));
        samples.push(Sample::gauge(
            name("jvm_uptime_seconds"),
            "JVM uptime in seconds.",
            millis_to_seconds(jvm.uptime_in_millis),
        ));

        samples.push(Sample::gauge(
            name("mem_heap_used_percent"),
            "Percentage of the heap in use.",
            mem.heap_used_percent,
        ));
        samples.push(Sample::gauge(
            name("mem_heap_committed_bytes"),
            "Committed heap memory in bytes.",
            mem.heap_committed_in_bytes as f64,
        ));
        samples.push(Sample::gauge(
            name("mem_heap_max_bytes"),
            "Maximum heap memory in bytes.",
            mem.heap_max_in_bytes as f64,
        ));
        samples.push(Sample::gauge(
            name("mem_heap_used_bytes"),
            "Heap memory in use in bytes.",
            mem.heap_used_in_bytes as f64,
        ));
        samples.push(Sample::gauge(
            name("mem_nonheap_committed_bytes"),
            "Committed non-heap memory in bytes.",
            mem.non_heap_committed_in_bytes as f64,
        ));
        samples.push(Sample::gauge(
            name("mem_nonheap_used_bytes"),
            "Non-heap memory in use in bytes.",
            mem.non_heap_used_in_bytes as f64,
        ));

        for (pool, stats) in &mem.pools {
            samples.push(
                Sample::gauge(
                    name("mem_pool_used_bytes"),
                    "Memory pool usage in bytes.",
                    stats.used_in_bytes as f64,
                )
                .with_label("pool", pool),
            );
            samples.push(
                Sample::gauge(
                    name("mem_pool_peak_used_bytes"),
                    "Peak memory pool usage in bytes.",
                    stats.peak_used_in_bytes as f64,
                )
                .with_label("pool", pool),
            );
            samples.push(
                Sample::gauge(
                    name("mem_pool_max_bytes"),
                    "Maximum memory pool size in bytes (-1 if undefined).",
                    stats.max_in_bytes as f64,
                )
                .with_label("pool", pool),
            );
            samples.push(
                Sample::gauge(
                    name("mem_pool_peak_max_bytes"),
                    "Peak maximum memory pool size in bytes (-1 if undefined).",
                    stats.peak_max_in_bytes as f64,
                )
                .with_label("pool", pool),
            );
            samples.push(
                Sample::gauge(
                    name("mem_pool_committed_bytes"),
                    "Committed memory pool size in bytes.",
                    stats.committed_in_bytes as f64,
                )
                .with_label("pool", pool),
            );
        }

        for (collector, stats) in &jvm.gc.collectors {
            samples.push(
                Sample::counter(
                    name("gc_collection_time_seconds_total"),
                    "Time spent in garbage collection in seconds.",
                    millis_to_seconds(stats.collection_time_in_millis),
                )
                .with_label("collector", collector),
            );
            samples.push(
                Sample::counter(
                    name("gc_collection_count_total"),
                    "Number of garbage collection runs.",
                    stats.collection_count as f64,
                )
                .with_label("collector", collector),
            );
        }

        let process = &self.process;
        samples.push(Sample::gauge(
            name("process_open_filedescriptors"),
            "Number of open file descriptors.",
            process.open_file_descriptors as f64,
        ));
        samples.push(Sample::gauge(
            name("process_peak_open_filedescriptors"),
            "Peak number of open file descriptors.",
            process.peak_open_file_descriptors as f64,
        ));
        samples.push(Sample::gauge(
            name("process_max_filedescriptors"),
            "Maximum number of file descriptors.",
            process.max_file_descriptors as f64,
        ));
        samples.push(Sample::gauge(
            name("process_cpu_percent"),
            "Recent CPU usage of the Logstash process in percent.",
            process.cpu.percent,
        ));
        samples.push(Sample::counter(
            name("process_cpu_total_seconds_total"),
            "Total CPU time consumed by the Logstash process in seconds.",
            millis_to_seconds(process.cpu.total_in_millis),
        ));
        samples.push(Sample::gauge(
            name("process_mem_total_virtual_bytes"),
            "Total virtual memory of the Logstash process in bytes.",
            process.mem.total_virtual_in_bytes as f64,
        ));

        for (pipeline, stats) in self.pipelines() {
            pipeline_samples(&mut samples, &pipeline, stats);
        }

        samples
    }
}

fn pipeline_samples(samples: &mut Vec<Sample>, pipeline: &str, stats: &PipelineStats) {
    let events = &stats.events;

    samples.push(
        Sample::gauge(
            name("pipeline_up"),
            "Whether the last pipeline reload succeeded (1) or failed (0).",
            if stats.reloads.is_up() { 1.0 } else { 0.0 },
        )
        .with_label("pipeline", pipeline),
    );
    samples.push(
        Sample::counter(
            name("pipeline_events_in_total"),
            "Events received by the pipeline.",
            events.events_in as f64,
        )
        .with_label("pipeline", pipeline),
    );
    samples.push(
        Sample::counter(
            name("pipeline_events_filtered_total"),
            "Events filtered by the pipeline.",
            events.filtered as f64,
        )
        .with_label("pipeline", pipeline),
    );
    samples.push(
        Sample::counter(
            name("pipeline_events_out_total"),
            "Events emitted by the pipeline.",
            events.events_out as f64,
        )
        .with_label("pipeline", pipeline),
    );
    samples.push(
        Sample::counter(
            name("pipeline_duration_seconds_total"),
            "Time events spent in the pipeline in seconds.",
            millis_to_seconds(events.duration_in_millis),
        )
        .with_label("pipeline", pipeline),
    );
    samples.push(
        Sample::counter(
            name("pipeline_queue_push_duration_seconds_total"),
            "Time inputs spent pushing events to the queue in seconds.",
            millis_to_seconds(events.queue_push_duration_in_millis),
        )
        .with_label("pipeline", pipeline),
    );
    samples.push(
        Sample::counter(
            name("pipeline_reloads_successes_total"),
            "Successful pipeline reloads.",
            stats.reloads.successes as f64,
        )
        .with_label("pipeline", pipeline),
    );
    samples.push(
        Sample::counter(
            name("pipeline_reloads_failures_total"),
            "Failed pipeline reloads.",
            stats.reloads.failures as f64,
        )
        .with_label("pipeline", pipeline),
    );

    if let Some(queue) = &stats.queue {
        let queued = queue.events_count.unwrap_or(queue.events);
        samples.push(
            Sample::gauge(
                name("pipeline_queue_events"),
                "Events currently held in the queue.",
                queued as f64,
            )
            .with_label("pipeline", pipeline)
            .with_label("queue_type", &queue.queue_type),
        );
        if let Some(size) = queue.queue_size_in_bytes {
            samples.push(
                Sample::gauge(
                    name("pipeline_queue_size_bytes"),
                    "Current size of the persisted queue in bytes.",
                    size as f64,
                )
                .with_label("pipeline", pipeline)
                .with_label("queue_type", &queue.queue_type),
            );
        }
        if let Some(max) = queue.max_queue_size_in_bytes {
            samples.push(
                Sample::gauge(
                    name("pipeline_queue_max_size_bytes"),
                    "Configured maximum size of the persisted queue in bytes.",
                    max as f64,
                )
                .with_label("pipeline", pipeline)
                .with_label("queue_type", &queue.queue_type),
            );
        }
    }

    let groups = [
        ("input", &stats.plugins.inputs),
        ("filter", &stats.plugins.filters),
        ("output", &stats.plugins.outputs),
    ];
    for (plugin_type, plugins) in groups {
        for plugin in plugins.iter() {
            plugin_samples(samples, pipeline, plugin_type, plugin);
        }
    }
}

fn plugin_samples(samples: &mut Vec<Sample>, pipeline: &str, plugin_type: &str, plugin: &PluginStats) {
    let labelled = |sample: Sample| {
        sample
            .with_label("pipeline", pipeline)
            .with_label("plugin", &plugin.name)
            .with_label("plugin_id", &plugin.id)
            .with_label("plugin_type", plugin_type)
    };

    samples.push(labelled(Sample::counter(
        name("plugin_events_in_total"),
        "Events received by the plugin.",
        plugin.events.events_in as f64,
    )));
    samples.push(labelled(Sample::counter(
        name("plugin_events_out_total"),
        "Events emitted by the plugin.",
        plugin.events.events_out as f64,
    )));
    samples.push(labelled(Sample::counter(
        name("plugin_duration_seconds_total"),
        "Time spent in the plugin in seconds.",
        millis_to_seconds(plugin.events.duration_in_millis),
    )));
    if plugin_type == "input" {
        samples.push(labelled(Sample::counter(
            name("plugin_queue_push_duration_seconds_total"),
            "Time the input plugin spent pushing to the queue in seconds.",
            millis_to_seconds(plugin.events.queue_push_duration_in_millis),
        )));
    }
    if let Some(matches) = plugin.matches {
        samples.push(labelled(Sample::counter(
            name("plugin_matches_total"),
            "Successful matches of the plugin.",
            matches as f64,
        )));
    }
    if let Some(failures) = plugin.failures {
        samples.push(labelled(Sample::counter(
            name("plugin_failures_total"),
            "Failed matches of the plugin.",
            failures as f64,
        )));
    }
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Collects runtime statistics of one Logstash node.
#[derive(Debug, Clone)]
pub struct NodeStatsCollector {
    fetcher: Fetcher,
}

impl NodeStatsCollector {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl DataProducer for NodeStatsCollector {
    type Output = NodeStatsResponse;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        self.fetcher.fetch().await
    }
}
