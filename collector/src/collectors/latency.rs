use crate::{
    record::group_by_type,
    AggregationError,
    Collector,
    Measurement,
    MeasurementBuffer,
    MetricSummary,
    TelemetryRecord,
};
use aviso_monitoring_config::{
    ReporterConfig,
    ReporterKind,
};
use std::collections::BTreeMap;

/// Response times of an aviso service, in seconds.
///
/// The primary telemetry type is checked against the thresholds by its `max`;
/// `sub_tlms` are summarized without thresholds.
#[derive(Debug)]
pub struct LatencyCollector {
    config: ReporterConfig,
    service_host: String,
    buffer: MeasurementBuffer,
}

impl LatencyCollector {
    pub fn new(config: ReporterConfig, service_host: impl Into<String>) -> Self {
        Self {
            buffer: MeasurementBuffer::new(config.buffer),
            service_host: service_host.into(),
            config,
        }
    }
}

impl Collector for LatencyCollector {
    fn name(&self) -> &'static str {
        match self.config.kind {
            ReporterKind::AvisoAuth => "aviso-auth",
            _ => "aviso-rest",
        }
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
            let summary = if Some(&telemetry_type) == primary {
                MetricSummary::numeric(&telemetry_type, values.iter().copied())?.with_thresholds(thresholds)
            } else if self.config.accepts(&telemetry_type) {
                MetricSummary::from_values(values.iter().copied())
            } else {
                debug!(collector = self.name(), %telemetry_type, "Skipping unexpected telemetry type");
                continue;
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
