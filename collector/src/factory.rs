use crate::{
    Collector,
    EtcdProbe,
    Measurement,
    Reporter,
    TelemetrySink,
    Transmitter,
};
use aviso_monitoring_config::{
    Config,
    ReporterKind,
};
use futures::future::join_all;
use std::{
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Used when no reporter is enabled and so no monitor server is configured.
const FALLBACK_REQ_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Failed to build the HTTP client of the {0} probe")]
    Probe(ReporterKind, #[source] reqwest::Error),
}

/// One reporter section turned into a running collector.
#[derive(Debug)]
pub struct Monitor {
    collector: Arc<Reporter>,
    transmitter: Transmitter<Reporter>,
    probe: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn kind(&self) -> ReporterKind {
        self.collector.kind()
    }

    pub fn collector(&self) -> &Arc<Reporter> {
        &self.collector
    }

    pub fn transmitter(&self) -> &Transmitter<Reporter> {
        &self.transmitter
    }
}

/// All monitors of the service.
#[derive(Debug)]
pub struct Monitors {
    monitors: Vec<Monitor>,
    probe_token: CancellationToken,
}

impl Monitors {
    pub fn get(&self, kind: ReporterKind) -> Option<&Monitor> {
        self.monitors.iter().find(|monitor| monitor.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.iter()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.iter().filter(|monitor| monitor.collector.enabled())
    }

    /// Hands a measurement to every enabled collector expecting its telemetry
    /// type. Returns how many took it.
    pub fn route(&self, measurement: Measurement) -> usize {
        let targets = self
            .enabled()
            .filter(|monitor| monitor.collector.config().accepts(&measurement.telemetry_type))
            .collect::<Vec<_>>();
        if targets.is_empty() {
            trace!(telemetry_type = %measurement.telemetry_type, "No collector for measurement");
        }
        for monitor in &targets {
            monitor.collector.record(measurement.clone());
        }
        targets.len()
    }

    /// Stops probes and transmitters. In-flight cycles finish first.
    pub async fn stop(mut self) {
        self.probe_token.cancel();
        join_all(std::mem::take(&mut self.monitors).into_iter().map(|monitor| async move {
            if let Some(probe) = monitor.probe {
                if let Err(err) = probe.await {
                    error!(collector = monitor.collector.name(), "Probe task failed: {err}");
                }
            }
            monitor.transmitter.stop().await;
        }))
        .await;
        info!("All monitors stopped");
    }
}

impl Drop for Monitors {
    fn drop(&mut self) {
        self.probe_token.cancel();
    }
}

pub struct MonitorFactory;

impl MonitorFactory {
    /// Builds one monitor per reporter section and starts the enabled ones.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(config: &Config, sink: Arc<dyn TelemetrySink>) -> Result<Monitors, FactoryError> {
        let (service_host, req_timeout) = config
            .monitor_server
            .as_ref()
            .map(|monitor| (monitor.service_host.clone(), monitor.req_timeout))
            .unwrap_or_else(|| (String::new(), FALLBACK_REQ_TIMEOUT));
        let probe_token = CancellationToken::new();

        let mut monitors = Vec::new();
        for reporter in config.reporters() {
            let collector = Arc::new(Reporter::new(reporter.clone(), service_host.clone()));
            let transmitter = Transmitter::new(collector.clone(), sink.clone(), req_timeout);

            let probe = if reporter.enabled && reporter.kind == ReporterKind::Etcd {
                let probe = EtcdProbe::new(reporter).map_err(|err| FactoryError::Probe(reporter.kind, err))?;
                Some(probe.spawn(collector.clone(), probe_token.clone()))
            } else {
                None
            };
            transmitter.start();

            info!(
                reporter = %reporter.kind,
                enabled = reporter.enabled,
                telemetry_type = %reporter.tlm_type,
                "Monitor created"
            );
            monitors.push(Monitor {
                collector,
                transmitter,
                probe,
            });
        }

        Ok(Monitors {
            monitors,
            probe_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{
            http_stub,
            reporter_config,
            RecordingSink,
            SinkBehavior,
        },
        Phase,
        Status,
    };
    use aviso_monitoring_config::{
        MonitorServerConfig,
        Secret,
    };
    use pretty_assertions::assert_eq;
    use url::Url;

    fn config(rest: bool, auth: bool, etcd: bool) -> Config {
        Config {
            udp_server: None,
            monitor_server: Some(MonitorServerConfig {
                url: Url::parse("https://localhost").unwrap(),
                username: "monitor".to_string(),
                password: Secret::from("s3cret"),
                service_host: "aviso-test".to_string(),
                req_timeout: Duration::from_secs(1),
                extra: Default::default(),
            }),
            aviso_rest_reporter: reporter_config(ReporterKind::AvisoRest, rest),
            aviso_auth_reporter: reporter_config(ReporterKind::AvisoAuth, auth),
            etcd_reporter: reporter_config(ReporterKind::Etcd, etcd),
            extra: Default::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_enabled_reporters_run() {
        let sink = RecordingSink::new(SinkBehavior::Accept);
        let monitors = MonitorFactory::build(&config(true, false, false), sink.clone()).unwrap();

        assert_eq!(monitors.iter().count(), 3);
        let kinds = monitors.enabled().map(Monitor::kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![ReporterKind::AvisoRest]);
        let phase = |kind| monitors.get(kind).unwrap().transmitter().state().phase;
        assert_eq!(phase(ReporterKind::AvisoRest), Phase::Running);
        assert_eq!(phase(ReporterKind::AvisoAuth), Phase::Created);
        assert_eq!(phase(ReporterKind::Etcd), Phase::Created);
        monitors.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_enabled_is_fine() {
        let sink = RecordingSink::new(SinkBehavior::Accept);
        let mut config = config(false, false, false);
        config.monitor_server = None;
        let monitors = MonitorFactory::build(&config, sink.clone()).unwrap();

        assert_eq!(monitors.enabled().count(), 0);
        assert_eq!(monitors.route(Measurement::new("rest_resp_time", 1.0)), 0);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(sink.records().is_empty());
        monitors.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn routes_by_telemetry_type() {
        let sink = RecordingSink::new(SinkBehavior::Accept);
        let monitors = MonitorFactory::build(&config(true, true, false), sink.clone()).unwrap();

        assert_eq!(monitors.route(Measurement::new("rest_resp_time", 1.0)), 1);
        assert_eq!(monitors.route(Measurement::new("auth_login", 1.0)), 1);
        assert_eq!(monitors.route(Measurement::new("etcd_store_size", 1.0)), 0);

        let mut state = monitors.get(ReporterKind::AvisoAuth).unwrap().transmitter().subscribe();
        state.wait_for(|state| state.cycles >= 1).await.unwrap();

        let auth = sink
            .records()
            .into_iter()
            .find(|record| record.metric("auth_login").is_some())
            .unwrap();
        assert_eq!(auth.service_host, "aviso-test");
        assert_eq!(auth.status, Status::Ok);
        monitors.stop().await;
    }

    #[tokio::test]
    async fn etcd_monitor_probes_members() {
        let member = http_stub(|path| match path {
            "/health" => (200, r#"{"health":"true"}"#.to_string()),
            "/metrics" => (200, "etcd_mvcc_db_total_size_in_bytes 90\n".to_string()),
            _ => (404, String::new()),
        })
        .await;
        let mut config = config(false, false, true);
        config.etcd_reporter.member_urls = vec![member];
        let sink = RecordingSink::new(SinkBehavior::Accept);
        let monitors = MonitorFactory::build(&config, sink).unwrap();

        let collector = monitors.get(ReporterKind::Etcd).unwrap().collector().clone();
        tokio::time::timeout(Duration::from_secs(10), async {
            while collector.buffer().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let batch = collector.buffer().drain().measurements;
        let record = collector.aggregate(batch).unwrap();
        assert_eq!(record.metric("etcd_store_size").unwrap().status, Status::Warning);
        assert_eq!(record.metric("etcd_cluster_status").unwrap().status, Status::Ok);
        monitors.stop().await;
    }
}
