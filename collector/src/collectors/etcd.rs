use crate::{
    record::group_by_type,
    AggregationError,
    Collector,
    Measurement,
    MeasurementBuffer,
    MeasurementValue,
    MetricSummary,
    Status,
    TelemetryRecord,
};
use aviso_monitoring_config::ReporterConfig;
use futures::future::join_all;
use serde_json::json;
use std::{
    collections::BTreeMap,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use url::Url;

pub const STORE_SIZE: &str = "etcd_store_size";
pub const CLUSTER_STATUS: &str = "etcd_cluster_status";
pub const TOTAL_KEYS: &str = "etcd_total_keys";

const STORE_SIZE_METRIC: &str = "etcd_mvcc_db_total_size_in_bytes";
const TOTAL_KEYS_METRIC: &str = "etcd_debugging_mvcc_keys_total";

/// Health and size of the etcd cluster backing aviso.
///
/// The thresholds, if any, apply to the primary telemetry type by its `max`.
/// Any unhealthy cluster status in the batch makes that metric critical.
#[derive(Debug)]
pub struct EtcdCollector {
    config: ReporterConfig,
    service_host: String,
    buffer: MeasurementBuffer,
}

impl EtcdCollector {
    pub fn new(config: ReporterConfig, service_host: impl Into<String>) -> Self {
        Self {
            buffer: MeasurementBuffer::new(config.buffer),
            service_host: service_host.into(),
            config,
        }
    }
}

fn is_unhealthy(value: &MeasurementValue) -> bool {
    match value {
        MeasurementValue::Number(number) => *number == 0.0,
        MeasurementValue::Structured(serde_json::Value::Bool(healthy)) => !healthy,
        MeasurementValue::Structured(serde_json::Value::Object(fields)) => {
            fields.get("healthy") == Some(&serde_json::Value::Bool(false))
        }
        MeasurementValue::Structured(_) => false,
    }
}

impl Collector for EtcdCollector {
    fn name(&self) -> &'static str {
        "etcd"
    }

    fn config(&self) -> &ReporterConfig {
        &self.config
    }

    fn buffer(&self) -> &MeasurementBuffer {
        &self.buffer
    }

    fn aggregate(&self, batch: Vec<Measurement>) -> Result<TelemetryRecord, AggregationError> {
        let primary = self.config.tlm_type.primary();
        let thresholds = self.config.thresholds.as_ref();

        let mut metrics = BTreeMap::new();
        for (telemetry_type, values) in group_by_type(&batch) {
            if !self.config.accepts(&telemetry_type) {
                debug!(collector = self.name(), %telemetry_type, "Skipping unexpected telemetry type");
                continue;
            }
            let summary = if telemetry_type.as_str() == CLUSTER_STATUS {
                let status = if values.iter().any(|value| is_unhealthy(value)) {
                    Status::Critical
                } else {
                    Status::Ok
                };
                MetricSummary::from_values(values.iter().copied()).with_status(status)
            } else if Some(&telemetry_type) == primary {
                MetricSummary::numeric(&telemetry_type, values.iter().copied())?.with_thresholds(thresholds)
            } else {
                MetricSummary::numeric(&telemetry_type, values.iter().copied())?
            };
            metrics.insert(telemetry_type, summary);
        }

        Ok(TelemetryRecord::new(
            self.config.tlm_type.clone(),
            &self.service_host,
            metrics,
            self.config.thresholds,
        ))
    }
}

/// What one member answered.
#[derive(Debug)]
struct MemberReport {
    healthy: bool,
    store_size: Option<f64>,
    total_keys: Option<f64>,
}

/// Polls `/health` and `/metrics` of every etcd member.
#[derive(Debug, Clone)]
pub struct EtcdProbe {
    client: reqwest::Client,
    member_urls: Vec<Url>,
    interval: Duration,
}

impl EtcdProbe {
    pub fn new(config: &ReporterConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.req_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            member_urls: config.member_urls.clone(),
            interval: config.probe_interval,
        })
    }

    /// Probes all members once.
    ///
    /// The cluster is healthy only if every member is. Sizes and key counts are
    /// the largest reported by any member.
    pub async fn probe(&self) -> Vec<Measurement> {
        let reports = join_all(self.member_urls.iter().map(|url| self.probe_member(url))).await;

        let members = self
            .member_urls
            .iter()
            .zip(&reports)
            .map(|(url, report)| (url.to_string(), serde_json::Value::Bool(report.healthy)))
            .collect::<serde_json::Map<_, _>>();
        let healthy = !reports.is_empty() && reports.iter().all(|report| report.healthy);

        let mut measurements = vec![Measurement::new(
            CLUSTER_STATUS,
            MeasurementValue::Structured(json!({ "healthy": healthy, "members": members })),
        )];
        let largest = |pick: fn(&MemberReport) -> Option<f64>| reports.iter().filter_map(pick).reduce(f64::max);
        if let Some(size) = largest(|report| report.store_size) {
            measurements.push(Measurement::new(STORE_SIZE, size));
        }
        if let Some(keys) = largest(|report| report.total_keys) {
            measurements.push(Measurement::new(TOTAL_KEYS, keys));
        }
        measurements
    }

    async fn probe_member(&self, url: &Url) -> MemberReport {
        let healthy = match self.health(url).await {
            Ok(healthy) => healthy,
            Err(err) => {
                warn!(%url, "etcd health check failed: {err}");
                false
            }
        };
        let (store_size, total_keys) = match self.metrics(url).await {
            Ok(metrics) => (
                parse_metric(&metrics, STORE_SIZE_METRIC),
                parse_metric(&metrics, TOTAL_KEYS_METRIC),
            ),
            Err(err) => {
                warn!(%url, "Fetching etcd metrics failed: {err}");
                (None, None)
            }
        };
        MemberReport {
            healthy,
            store_size,
            total_keys,
        }
    }

    async fn health(&self, url: &Url) -> Result<bool, ProbeError> {
        let body: serde_json::Value = self
            .client
            .get(url.join("health")?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let health = body.get("health");
        Ok(health == Some(&serde_json::Value::Bool(true)) || health.and_then(serde_json::Value::as_str) == Some("true"))
    }

    async fn metrics(&self, url: &Url) -> Result<String, ProbeError> {
        Ok(self
            .client
            .get(url.join("metrics")?)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?)
    }

    /// Probes every `probe_interval`, starting right away, until `token` is cancelled.
    pub fn spawn<C: Collector>(self, collector: Arc<C>, token: CancellationToken) -> JoinHandle<()> {
        tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                for measurement in self.probe().await {
                    if collector.config().accepts(&measurement.telemetry_type) {
                        collector.record(measurement);
                    }
                }
            }
            debug!(collector = collector.name(), "Probe task canceled");
        })
    }
}

#[derive(Debug, Error)]
enum ProbeError {
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Reads the value of an unlabelled sample from Prometheus text output.
fn parse_metric(text: &str, name: &str) -> Option<f64> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let mut parts = line.split_whitespace();
            (parts.next()? == name).then(|| parts.next()?.parse().ok()).flatten()
        })
}
