//! Helpers shared by the unit tests of this crate.

use crate::{
    TelemetryRecord,
    TelemetrySink,
    TransmitError,
};
use aviso_monitoring_config::{
    BufferPolicy,
    ReporterConfig,
    ReporterKind,
    TelemetryType,
    TelemetryTypes,
    Thresholds,
};
use parking_lot::Mutex;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{
        AsyncReadExt as _,
        AsyncWriteExt as _,
    },
    net::TcpListener,
};
use url::Url;

pub(crate) fn reporter_config(kind: ReporterKind, enabled: bool) -> ReporterConfig {
    let (tlm_type, thresholds, sub_tlms): (TelemetryTypes, _, _) = match kind {
        ReporterKind::AvisoRest => ("rest_resp_time".into(), Some((10.0, 20.0)), vec![]),
        ReporterKind::AvisoAuth => (
            "auth_resp_time".into(),
            Some((10.0, 20.0)),
            vec![TelemetryType::from("auth_login")],
        ),
        ReporterKind::Etcd => (
            vec!["etcd_store_size", "etcd_cluster_status", "etcd_total_keys"].into(),
            Some((80.0, 95.0)),
            vec![],
        ),
    };
    ReporterConfig {
        kind,
        enabled,
        tlm_type,
        frequency: Duration::from_secs(60),
        thresholds: thresholds.map(|(warning, critical)| Thresholds { warning, critical }),
        req_timeout: Some(Duration::from_secs(5)),
        member_urls: Vec::new(),
        sub_tlms,
        probe_interval: ReporterConfig::DEFAULT_PROBE_INTERVAL,
        buffer: BufferPolicy::Unbounded,
        extra: Default::default(),
    }
}

/// What the stub sink does with each record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SinkBehavior {
    Accept,
    Fail,
    Hang,
}

/// Sink keeping every record it was handed.
#[derive(Debug)]
pub(crate) struct RecordingSink {
    pub behavior: Mutex<SinkBehavior>,
    pub records: Mutex<Vec<TelemetryRecord>>,
}

impl RecordingSink {
    pub fn new(behavior: SinkBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            records: Mutex::default(),
        })
    }

    pub fn set_behavior(&self, behavior: SinkBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn send<'a>(
        &'a self,
        record: &'a TelemetryRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransmitError>> + Send + 'a>> {
        Box::pin(async move {
            self.records.lock().push(record.clone());
            let behavior = *self.behavior.lock();
            match behavior {
                SinkBehavior::Accept => Ok(()),
                SinkBehavior::Fail => Err(TransmitError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }),
                SinkBehavior::Hang => std::future::pending().await,
            }
        })
    }
}

/// Minimal HTTP/1.1 server answering every GET with `respond(path)`.
pub(crate) async fn http_stub<F>(respond: F) -> Url
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let respond = respond.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                while read < buf.len() {
                    let n = stream.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = respond(&path);
                let response = format!(
                    "HTTP/1.1 {status} STUB\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}
