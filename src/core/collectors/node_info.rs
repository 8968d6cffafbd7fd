//! Node identity collector (`GET /_node`).
//!
//! Exposes static facts about the node as `logstash_info_*` series: info
//! gauges carrying the identity in labels, plus per-pipeline settings.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{
    traits::{DataProducer, IntoSamples},
    types::{metric_name, CollectorResult, Sample},
};
use crate::core::fetcher::Fetcher;

pub const NAME: &str = "info";
pub const PATH: &str = "/_node";

const NAMESPACE: &str = "logstash";
const SUBSYSTEM: &str = "info";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeInfoResponse {
    pub host: String,
    pub version: String,
    pub http_address: String,
    pub id: String,
    pub name: String,
    pub os: OsInfo,
    pub jvm: JvmInfo,
    pub pipeline: Option<PipelineInfo>,
    pub pipelines: BTreeMap<String, PipelineInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OsInfo {
    pub name: String,
    pub arch: String,
    pub version: String,
    pub available_processors: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JvmInfo {
    pub pid: u64,
    pub version: String,
    pub vm_name: String,
    pub vm_version: String,
    pub vm_vendor: String,
    pub start_time_in_millis: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineInfo {
    pub id: Option<String>,
    pub workers: u64,
    pub batch_size: u64,
    pub batch_delay: u64,
}

fn name(metric: &str) -> String {
    metric_name(NAMESPACE, SUBSYSTEM, metric)
}

impl IntoSamples for NodeInfoResponse {
    fn into_samples(self) -> Vec<Sample> {
        let mut samples = vec![
            Sample::gauge(name("node"), "Logstash node identity.", 1.0)
                .with_label("id", &self.id)
                .with_label("name", &self.name)
                .with_label("version", &self.version)
                .with_label("host", &self.host)
                .with_label("http_address", &self.http_address),
            Sample::gauge(name("os"), "Operating system of the Logstash node.", 1.0)
                .with_label("name", &self.os.name)
                .with_label("arch", &self.os.arch)
                .with_label("version", &self.os.version),
            Sample::gauge(
                name("os_available_processors"),
                "Processors available to the JVM.",
                self.os.available_processors as f64,
            ),
            Sample::gauge(name("jvm"), "JVM running the Logstash node.", 1.0)
                .with_label("name", &self.jvm.vm_name)
                .with_label("version", &self.jvm.version)
                .with_label("vendor", &self.jvm.vm_vendor),
            Sample::gauge(
                name("jvm_start_time_seconds"),
                "JVM start time as a Unix timestamp in seconds.",
                self.jvm.start_time_in_millis as f64 / 1000.0,
            ),
        ];

        let mut pipelines: BTreeMap<String, &PipelineInfo> =
            self.pipelines.iter().map(|(id, p)| (id.clone(), p)).collect();
        if let Some(single) = &self.pipeline {
            let id = single.id.clone().unwrap_or_else(|| "main".to_string());
            pipelines.entry(id).or_insert(single);
        }

        for (pipeline, info) in pipelines {
            samples.push(
                Sample::gauge(
                    name("pipeline_workers"),
                    "Number of pipeline worker threads.",
                    info.workers as f64,
                )
                .with_label("pipeline", &pipeline),
            );
            samples.push(
                Sample::gauge(
                    name("pipeline_batch_size"),
                    "Maximum events per worker batch.",
                    info.batch_size as f64,
                )
                .with_label("pipeline", &pipeline),
            );
            samples.push(
                Sample::gauge(
                    name("pipeline_batch_delay"),
                    "Batch delay in milliseconds.",
                    info.batch_delay as f64,
                )
                .with_label("pipeline", &pipeline),
            );
        }

        samples
    }
}

/// Collects identity and settings of one Logstash node.
#[derive(Debug, Clone)]
pub struct NodeInfoCollector {
    fetcher: Fetcher,
}

impl NodeInfoCollector {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl DataProducer for NodeInfoCollector {
    type Output = NodeInfoResponse;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        self.fetcher.fetch().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const NODE_INFO_6X: &str = r#"{
        "host": "ls-01",
        "version": "6.8.0",
        "http_address": "127.0.0.1:9600",
        "id": "a1b2",
        "name": "ls-01",
        "pipelines": {
            "main": {"workers": 8, "batch_size": 125, "batch_delay": 50, "config_reload_automatic": false}
        },
        "os": {"name": "Linux", "arch": "amd64", "version": "5.15.0", "available_processors": 8},
        "jvm": {"pid": 1, "version": "1.8.0_292", "vm_name": "OpenJDK 64-Bit Server VM", "vm_version": "25.292-b10", "vm_vendor": "AdoptOpenJDK", "start_time_in_millis": 1700000000000}
    }"#;

    #[test]
    fn node_identity_is_carried_in_labels() {
        let info: NodeInfoResponse = serde_json::from_str(NODE_INFO_6X).unwrap();
        let samples = info.into_samples();

        let node = samples
            .iter()
            .find(|s| s.name == "logstash_info_node")
            .unwrap();
        assert_eq!(node.value, 1.0);
        assert_eq!(
            node.labels,
            vec![
                ("id".to_string(), "a1b2".to_string()),
                ("name".to_string(), "ls-01".to_string()),
                ("version".to_string(), "6.8.0".to_string()),
                ("host".to_string(), "ls-01".to_string()),
                ("http_address".to_string(), "127.0.0.1:9600".to_string()),
            ]
        );
    }

    #[test]
    fn pipeline_settings_are_exposed() {
        let info: NodeInfoResponse = serde_json::from_str(NODE_INFO_6X).unwrap();
        let samples = info.into_samples();

        let workers = samples
            .iter()
            .find(|s| s.name == "logstash_info_pipeline_workers")
            .unwrap();
        assert_eq!(workers.value, 8.0);
        assert_eq!(workers.labels, vec![("pipeline".to_string(), "main".to_string())]);
        assert_eq!(samples.len(), 8);
    }

    #[test]
    fn single_pipeline_document_is_supported() {
        let info: NodeInfoResponse =
            serde_json::from_str(r#"{"pipeline": {"workers": 2, "batch_size": 50, "batch_delay": 5}}"#)
                .unwrap();
        let samples = info.into_samples();

        let batch = samples
            .iter()
            .find(|s| s.name == "logstash_info_pipeline_batch_size")
            .unwrap();
        assert_eq!(batch.value, 50.0);
    }
}
