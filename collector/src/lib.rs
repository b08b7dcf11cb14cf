//! Collection side of the aviso monitoring service.
//!
//! - [`MeasurementBuffer`]: measurements recorded between two cycles
//! - [`Collector`]: records measurements and aggregates a drained batch into a [`TelemetryRecord`]
//! - [`Transmitter`]: drains, aggregates and sends on a fixed period
//! - [`MonitorFactory`]: builds and starts one monitor per reporter section

#[macro_use]
extern crate tracing;

mod buffer;
pub mod collectors;
mod factory;
mod measurement;
mod record;
#[cfg(test)]
mod testing;
mod transmitter;

pub use buffer::{
    Drained,
    MeasurementBuffer,
};
pub use collectors::{
    Collector,
    EtcdCollector,
    EtcdProbe,
    LatencyCollector,
    Reporter,
};
pub use factory::{
    FactoryError,
    Monitor,
    MonitorFactory,
    Monitors,
};
pub use measurement::{
    Measurement,
    MeasurementValue,
};
pub use record::{
    AggregationError,
    MetricSummary,
    Status,
    TelemetryRecord,
};
pub use transmitter::{
    CycleOutcome,
    Phase,
    TelemetrySink,
    TransmitError,
    Transmitter,
    TransmitterState,
};
