use aviso_monitoring_collector::{
    Measurement,
    Monitors,
};
use aviso_monitoring_config::UdpServerConfig;
use eyre::{
    Context as _,
    Result,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// A datagram holds one measurement or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Datagram {
    One(Measurement),
    Many(Vec<Measurement>),
}

/// Receives JSON measurements over UDP and routes them to the collectors.
#[derive(Debug)]
pub struct UdpIngest {
    socket: UdpSocket,
    buffer_size: usize,
}

impl UdpIngest {
    pub async fn bind(config: &UdpServerConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.address())
            .await
            .wrap_err_with(|| format!("Failed to bind the UDP listener to {}", config.address()))?;
        info!(address = %config.address(), "Listening for measurements");
        Ok(Self {
            socket,
            buffer_size: config.buffer_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receives until the future is dropped.
    pub async fn run(&self, monitors: &Monitors) {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, from)) => match parse(&buf[..len]) {
                    Ok(measurements) => {
                        for measurement in measurements {
                            monitors.route(measurement);
                        }
                    }
                    Err(err) => warn!(%from, len, "Discarding malformed datagram: {err}"),
                },
                Err(err) => warn!("Receiving datagram failed: {err}"),
            }
        }
    }
}

fn parse(datagram: &[u8]) -> Result<Vec<Measurement>, serde_json::Error> {
    Ok(match serde_json::from_slice(datagram)? {
        Datagram::One(measurement) => vec![measurement],
        Datagram::Many(measurements) => measurements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aviso_monitoring_client::MonitorClient;
    use aviso_monitoring_collector::{
        Collector,
        MonitorFactory,
    };
    use aviso_monitoring_config::{
        sections::{
            MonitorServerSection,
            ReporterSection,
            UdpServerSection,
        },
        ConfigLoader,
        ConfigOverrides,
        ReporterKind,
        Secret,
    };
    use pretty_assertions::assert_eq;
    use std::{
        collections::HashMap,
        sync::Arc,
        time::Duration,
    };

    #[test]
    fn parses_single_and_batched_datagrams() {
        let one = parse(br#"{"telemetry_type": "rest_resp_time", "value": 0.2}"#).unwrap();
        assert_eq!(one.len(), 1);

        let many = parse(
            br#"[{"telemetry_type": "auth_resp_time", "value": 1},
                 {"telemetry_type": "auth_login", "value": 2, "timestamp": "2024-05-01T10:00:00Z"}]"#,
        )
        .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].telemetry_type.as_str(), "auth_login");

        assert!(parse(b"not json").is_err());
        assert!(parse(br#"{"value": 1}"#).is_err());
    }

    #[tokio::test]
    async fn routes_received_measurements() {
        let overrides = ConfigOverrides::new()
            .monitor_server(MonitorServerSection {
                url: Some("http://127.0.0.1:1/".to_string()),
                username: Some("monitor".to_string()),
                password: Some(Secret::from("s3cret")),
                ..Default::default()
            })
            .udp_server(UdpServerSection {
                port: Some(0),
                ..Default::default()
            })
            .reporter(ReporterKind::AvisoRest, ReporterSection::enabled(true))
            .reporter(ReporterKind::AvisoAuth, ReporterSection::enabled(true));
        let config = ConfigLoader::new()
            .with_environment(HashMap::new())
            .resolve(overrides)
            .unwrap();
        let client = MonitorClient::new(config.monitor_server.as_ref().unwrap()).unwrap();
        let monitors = MonitorFactory::build(&config, Arc::new(client)).unwrap();

        let ingest = UdpIngest::bind(config.udp_server.as_ref().unwrap()).await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = ingest.local_addr().unwrap();
        sender.send_to(b"garbage", target).await.unwrap();
        sender
            .send_to(
                br#"[{"telemetry_type": "rest_resp_time", "value": 0.3},
                     {"telemetry_type": "auth_resp_time", "value": 0.7}]"#,
                target,
            )
            .await
            .unwrap();

        let buffered = |kind| monitors.get(kind).unwrap().collector().buffer().len();
        let arrived = async {
            while buffered(ReporterKind::AvisoRest) + buffered(ReporterKind::AvisoAuth) < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::select! {
                _ = ingest.run(&monitors) => {}
                _ = arrived => {}
            }
        })
        .await
        .unwrap();

        assert_eq!(buffered(ReporterKind::AvisoRest), 1);
        assert_eq!(buffered(ReporterKind::AvisoAuth), 1);
        monitors.stop().await;
    }
}
