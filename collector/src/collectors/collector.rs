use crate::{
    AggregationError,
    Measurement,
    MeasurementBuffer,
    TelemetryRecord,
};
use aviso_monitoring_config::{
    ReporterConfig,
    TelemetryTypes,
};

/// Owns the buffer of one telemetry source and knows how to summarize it.
pub trait Collector: Send + Sync + 'static {
    /// Get the name of this collector
    fn name(&self) -> &'static str;

    fn config(&self) -> &ReporterConfig;

    fn buffer(&self) -> &MeasurementBuffer;

    /// Reduces a drained batch into one record. An empty batch gives a `no_data` record.
    fn aggregate(&self, batch: Vec<Measurement>) -> Result<TelemetryRecord, AggregationError>;

    fn enabled(&self) -> bool {
        self.config().enabled
    }

    fn telemetry_type(&self) -> &TelemetryTypes {
        &self.config().tlm_type
    }

    /// Appends a measurement for the next cycle. Disabled collectors ignore it.
    fn record(&self, measurement: Measurement) {
        if !self.enabled() {
            trace!(collector = self.name(), "Ignoring measurement, collector is disabled");
            return;
        }
        if !self.buffer().push(measurement) {
            trace!(collector = self.name(), "Buffer full, measurement dropped");
        }
    }
}
