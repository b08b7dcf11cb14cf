use aviso_monitoring_config::TelemetryType;
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

/// One raw observation, immutable once created.
///
/// On the wire it is a JSON object; `timestamp` is optional and defaults to the
/// time of reception.
///
/// ```json
/// {"telemetry_type": "rest_resp_time", "value": 0.42, "timestamp": "2024-05-01T10:00:00Z"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub telemetry_type: TelemetryType,
    pub value: MeasurementValue,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    pub fn new(telemetry_type: impl Into<TelemetryType>, value: impl Into<MeasurementValue>) -> Self {
        Self {
            telemetry_type: telemetry_type.into(),
            value: value.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Structured(serde_json::Value),
}

impl MeasurementValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Structured(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Number(value) => serde_json::Value::from(*value),
            Self::Structured(value) => value.clone(),
        }
    }
}

impl From<f64> for MeasurementValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<serde_json::Value> for MeasurementValue {
    fn from(value: serde_json::Value) -> Self {
        match value.as_f64() {
            Some(number) if value.is_number() => Self::Number(number),
            _ => Self::Structured(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_wire_format() {
        let measurement: Measurement = serde_json::from_str(
            r#"{"telemetry_type": "rest_resp_time", "value": 3, "timestamp": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(measurement.telemetry_type.as_str(), "rest_resp_time");
        assert_eq!(measurement.value, MeasurementValue::Number(3.0));
        assert_eq!(measurement.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let measurement: Measurement =
            serde_json::from_str(r#"{"telemetry_type": "etcd_cluster_status", "value": {"healthy": true}}"#).unwrap();
        assert_eq!(
            measurement.value,
            MeasurementValue::Structured(serde_json::json!({ "healthy": true }))
        );
    }
}
