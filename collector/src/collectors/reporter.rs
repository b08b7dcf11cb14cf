use crate::{
    AggregationError,
    Collector,
    EtcdCollector,
    LatencyCollector,
    Measurement,
    MeasurementBuffer,
    TelemetryRecord,
};
use aviso_monitoring_config::{
    ReporterConfig,
    ReporterKind,
};

/// Every collector the service knows how to build.
#[derive(Debug)]
pub enum Reporter {
    Latency(LatencyCollector),
    Etcd(EtcdCollector),
}

impl Reporter {
    pub fn new(config: ReporterConfig, service_host: impl Into<String>) -> Self {
        match config.kind {
            ReporterKind::AvisoRest | ReporterKind::AvisoAuth => {
                Self::Latency(LatencyCollector::new(config, service_host))
            }
            ReporterKind::Etcd => Self::Etcd(EtcdCollector::new(config, service_host)),
        }
    }

    pub fn kind(&self) -> ReporterKind {
        self.config().kind
    }

    fn inner(&self) -> &dyn Collector {
        match self {
            Self::Latency(collector) => collector,
            Self::Etcd(collector) => collector,
        }
    }
}

impl Collector for Reporter {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn config(&self) -> &ReporterConfig {
        self.inner().config()
    }

    fn buffer(&self) -> &MeasurementBuffer {
        self.inner().buffer()
    }

    fn aggregate(&self, batch: Vec<Measurement>) -> Result<TelemetryRecord, AggregationError> {
        self.inner().aggregate(batch)
    }
}
