//! End-to-end tests: a fake Logstash API on one port, the exporter on
//! another, scraped over HTTP with `reqwest`.

use std::{sync::Arc, time::Duration};

use axum::{routing::get, Router};
use logstash_exporter::{
    config::exporter::LogstashConfig,
    core::{
        aggregator::{Aggregator, ScrapeResult},
        collectors::registry::CollectorRegistry,
        metrics::ExporterMetrics,
    },
    server::{create_router, AppState},
};
use reqwest::{redirect::Policy, StatusCode};
use tokio::net::TcpListener;

// =============================================================================
// Test Helpers
// =============================================================================

const NODE_STATS: &str = r#"{
    "id": "a1b2", "name": "ls-01", "version": "7.17.0",
    "jvm": {
        "threads": {"count": 41, "peak_count": 43},
        "mem": {"heap_used_percent": 12, "heap_max_in_bytes": 1037959168,
                "pools": {"young": {"used_in_bytes": 1000, "max_in_bytes": -1}}},
        "gc": {"collectors": {"old": {"collection_time_in_millis": 1500, "collection_count": 3}}},
        "uptime_in_millis": 600000
    },
    "process": {"open_file_descriptors": 90, "max_file_descriptors": 16384,
                "cpu": {"total_in_millis": 123000, "percent": 3}},
    "pipelines": {
        "main": {
            "events": {"in": 100, "filtered": 99, "out": 98, "duration_in_millis": 5000},
            "plugins": {
                "inputs": [{"id": "beats_in", "name": "beats", "events": {"out": 100}}],
                "filters": [],
                "outputs": [{"id": "es_out", "name": "elasticsearch", "events": {"in": 99, "out": 98}}]
            },
            "reloads": {"successes": 1, "failures": 0},
            "queue": {"type": "memory"}
        }
    }
}"#;

const NODE_INFO: &str = r#"{
    "host": "ls-01", "version": "7.17.0", "http_address": "127.0.0.1:9600",
    "id": "a1b2", "name": "ls-01",
    "pipelines": {"main": {"workers": 8, "batch_size": 125, "batch_delay": 50}},
    "os": {"name": "Linux", "arch": "amd64", "version": "5.15.0", "available_processors": 8},
    "jvm": {"version": "11.0.13", "vm_name": "OpenJDK 64-Bit Server VM", "vm_vendor": "Eclipse Adoptium"}
}"#;

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn start_fake_logstash() -> String {
    spawn(
        Router::new()
            .route("/_node/stats", get(|| async { NODE_STATS }))
            .route("/_node", get(|| async { NODE_INFO })),
    )
    .await
}

/// An endpoint nobody listens on.
async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn aggregator(endpoint: &str, timeout_ms: u64) -> Aggregator {
    let config = LogstashConfig {
        endpoint: endpoint.to_string(),
        timeout_ms,
    };
    let registry = CollectorRegistry::new(&config).expect("Failed to build collectors");
    let metrics = ExporterMetrics::new().expect("Failed to register metrics");
    Aggregator::new(Arc::new(registry), Arc::new(metrics))
}

async fn start_exporter(aggregator: Aggregator) -> String {
    spawn(create_router(AppState::new(aggregator, "/metrics"))).await
}

async fn scrape(base_url: &str) -> (StatusCode, String, Option<String>) {
    let resp = reqwest::get(format!("{}/metrics", base_url))
        .await
        .expect("Failed to send metrics request");
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (status, resp.text().await.unwrap(), content_type)
}

// =============================================================================
// Scrape Tests
// =============================================================================

#[tokio::test]
async fn test_scrape_exposes_logstash_and_meta_metrics() {
    let logstash = start_fake_logstash().await;
    let exporter = start_exporter(aggregator(&logstash, 2000)).await;

    let (status, body, content_type) = scrape(&exporter).await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));
    assert!(body.contains("logstash_node_jvm_threads_count 41\n"));
    assert!(body.contains("logstash_node_mem_pool_max_bytes{pool=\"young\"} -1\n"));
    assert!(body.contains("logstash_node_pipeline_events_in_total{pipeline=\"main\"} 100\n"));
    assert!(body.contains("logstash_info_pipeline_workers{pipeline=\"main\"} 8\n"));
    assert!(body.contains(
        "logstash_exporter_scrape_duration_seconds_count{collector=\"node\",result=\"success\"} 1\n"
    ));
    assert!(body.contains(
        "logstash_exporter_scrape_duration_seconds_count{collector=\"info\",result=\"success\"} 1\n"
    ));
    assert!(!body.contains("result=\"error\""));
}

#[tokio::test]
async fn test_scrape_succeeds_when_logstash_is_down() {
    let exporter = start_exporter(aggregator(&closed_endpoint().await, 2000)).await;

    let (status, body, _) = scrape(&exporter).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("logstash_node_"));
    assert!(!body.contains("logstash_info_"));
    assert!(body.contains(
        "logstash_exporter_scrape_duration_seconds_count{collector=\"node\",result=\"error\"} 1\n"
    ));
    assert!(body.contains(
        "logstash_exporter_scrape_duration_seconds_count{collector=\"info\",result=\"error\"} 1\n"
    ));
}

#[tokio::test]
async fn test_timed_out_collector_is_reported_as_error() {
    let logstash = spawn(
        Router::new()
            .route(
                "/_node/stats",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    NODE_STATS
                }),
            )
            .route("/_node", get(|| async { NODE_INFO })),
    )
    .await;
    let aggregator = aggregator(&logstash, 200);

    let scrape = aggregator.run_scrape_cycle().await;

    let node = scrape.outcome("node").unwrap();
    assert_eq!(node.result, ScrapeResult::Error);
    assert_eq!(node.samples, 0);
    assert!(node.duration >= Duration::from_millis(200));
    assert!(node.duration < Duration::from_secs(5));
    assert_eq!(scrape.outcome("info").unwrap().result, ScrapeResult::Success);
    assert!(scrape
        .samples
        .iter()
        .all(|s| s.name.starts_with("logstash_info_")));
}

#[tokio::test]
async fn test_invalid_json_is_reported_as_error() {
    let logstash = spawn(
        Router::new()
            .route("/_node/stats", get(|| async { "<html>maintenance</html>" }))
            .route("/_node", get(|| async { NODE_INFO })),
    )
    .await;
    let exporter = start_exporter(aggregator(&logstash, 2000)).await;

    let (status, body, _) = scrape(&exporter).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("logstash_node_"));
    assert!(body.contains("logstash_info_node{"));
    assert!(body.contains(
        "logstash_exporter_scrape_duration_seconds_count{collector=\"node\",result=\"error\"} 1\n"
    ));
}

#[tokio::test]
async fn test_repeated_scrapes_return_same_values_and_accumulate_durations() {
    let logstash = start_fake_logstash().await;
    let aggregator = aggregator(&logstash, 2000);

    let first = aggregator.run_scrape_cycle().await;
    let second = aggregator.run_scrape_cycle().await;

    let values = |samples: &[logstash_exporter::core::collectors::types::Sample]| {
        let mut v: Vec<_> = samples
            .iter()
            .map(|s| (s.name.clone(), s.labels.clone(), s.value.to_bits()))
            .collect();
        v.sort();
        v
    };
    assert_eq!(values(&first.samples), values(&second.samples));

    let count = aggregator
        .metrics()
        .scrape_duration()
        .with_label_values(&["node", "success"])
        .get_sample_count();
    assert_eq!(count, 2);
}

// =============================================================================
// Routing Tests
// =============================================================================

#[tokio::test]
async fn test_other_paths_redirect_to_metrics() {
    let exporter = start_exporter(aggregator(&closed_endpoint().await, 200)).await;
    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    for path in ["/", "/anything/else"] {
        let resp = client
            .get(format!("{}{}", exporter, path))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            resp.headers().get(reqwest::header::LOCATION).unwrap(),
            "/metrics"
        );
    }
}

#[test]
fn test_malformed_endpoint_fails_startup() {
    let config = LogstashConfig {
        endpoint: "localhost:9600".to_string(),
        timeout_ms: 1000,
    };
    assert!(CollectorRegistry::new(&config).is_err());
}
