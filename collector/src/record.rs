use crate::{
    Measurement,
    MeasurementValue,
};
use aviso_monitoring_config::{
    TelemetryType,
    TelemetryTypes,
    Thresholds,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use strum::Display;
use thiserror::Error;

/// Health derived from a batch. Ordered from best to worst, except that
/// `NoData` ranks below everything.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    #[default]
    NoData,
    Ok,
    Warning,
    Critical,
}

impl Status {
    /// A value reaching a threshold takes that threshold's status.
    pub fn from_thresholds(value: f64, thresholds: Option<&Thresholds>) -> Self {
        match thresholds {
            Some(t) if value >= t.critical => Self::Critical,
            Some(t) if value >= t.warning => Self::Warning,
            _ => Self::Ok,
        }
    }
}

/// Summary of the measurements of one telemetry type within one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    pub last: serde_json::Value,
    pub status: Status,
}

impl MetricSummary {
    /// Summarizes any values; min, max and avg only cover the numeric ones.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a MeasurementValue>) -> Self {
        let mut count = 0;
        let mut numbers = Vec::new();
        let mut last = serde_json::Value::Null;
        for value in values {
            count += 1;
            last = value.to_json();
            if let Some(number) = value.as_number() {
                numbers.push(number);
            }
        }

        let (min, max, avg) = if numbers.is_empty() {
            (None, None, None)
        } else {
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = numbers.iter().sum::<f64>() / numbers.len() as f64;
            (Some(min), Some(max), Some(avg))
        };

        Self {
            count,
            min,
            max,
            avg,
            last,
            status: if count == 0 { Status::NoData } else { Status::Ok },
        }
    }

    /// Summarizes values that must all be numbers.
    pub fn numeric<'a>(
        telemetry_type: &TelemetryType,
        values: impl IntoIterator<Item = &'a MeasurementValue> + Clone,
    ) -> Result<Self, AggregationError> {
        if let Some(value) = values.clone().into_iter().find(|value| value.as_number().is_none()) {
            return Err(AggregationError::NonNumeric {
                telemetry_type: telemetry_type.clone(),
                value: value.to_json(),
            });
        }
        Ok(Self::from_values(values))
    }

    /// Status of `max` against the thresholds.
    pub fn with_thresholds(mut self, thresholds: Option<&Thresholds>) -> Self {
        if let Some(max) = self.max {
            self.status = Status::from_thresholds(max, thresholds);
        }
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

/// The periodic summary sent to the monitoring server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub telemetry_type: TelemetryTypes,
    pub service_host: String,
    pub status: Status,
    pub metrics: BTreeMap<TelemetryType, MetricSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryRecord {
    /// Builds a record whose status is the worst status of its metrics.
    pub fn new(
        telemetry_type: TelemetryTypes,
        service_host: impl Into<String>,
        metrics: BTreeMap<TelemetryType, MetricSummary>,
        thresholds: Option<Thresholds>,
    ) -> Self {
        let status = metrics
            .values()
            .map(|metric| metric.status)
            .max()
            .unwrap_or_default();
        Self {
            telemetry_type,
            service_host: service_host.into(),
            status,
            metrics,
            thresholds,
            timestamp: Utc::now(),
        }
    }

    pub fn metric(&self, telemetry_type: &str) -> Option<&MetricSummary> {
        self.metrics.get(&TelemetryType::from(telemetry_type))
    }
}

/// Groups a batch by telemetry type, keeping arrival order inside each group.
pub(crate) fn group_by_type(batch: &[Measurement]) -> BTreeMap<TelemetryType, Vec<&MeasurementValue>> {
    let mut groups = BTreeMap::<TelemetryType, Vec<&MeasurementValue>>::new();
    for measurement in batch {
        groups
            .entry(measurement.telemetry_type.clone())
            .or_default()
            .push(&measurement.value);
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("{telemetry_type} expects numeric values, got {value}")]
    NonNumeric {
        telemetry_type: TelemetryType,
        value: serde_json::Value,
    },

    #[error("aggregation panicked: {0}")]
    Panicked(String),
}
