use crate::UdpIngest;
use aviso_monitoring_client::MonitorClient;
use aviso_monitoring_collector::{
    MonitorFactory,
    Monitors,
};
use aviso_monitoring_config::{
    Args,
    Config,
    ConfigLoader,
};
use color_eyre::Result;
use eyre::{
    Context as _,
    OptionExt as _,
};
use std::{
    future::Future,
    sync::Arc,
};

/// The monitoring service: collectors, their transmitters and the UDP listener.
pub struct App {
    config: Config,
}

impl App {
    /// Resolves the configuration, with `args` as the highest priority layer.
    pub fn new(args: Args) -> Result<Self> {
        let loader = match &args.config {
            Some(path) => ConfigLoader::new().with_file(path),
            None => ConfigLoader::new().with_user_config(),
        };
        let config = loader.resolve(args)?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs until ctrl-c.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {err}");
            }
        })
        .await
    }

    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        if !self.config.any_reporter_enabled() {
            warn!("No reporter is enabled, nothing to do until shutdown");
            shutdown.await;
            return Ok(());
        }

        let monitor_server = self
            .config
            .monitor_server
            .as_ref()
            .ok_or_eyre("monitor_server must be configured when a reporter is enabled")?;
        let client = MonitorClient::new(monitor_server).wrap_err("Failed to build the monitor client")?;
        let monitors = MonitorFactory::build(&self.config, Arc::new(client))?;

        let ingest = match &self.config.udp_server {
            Some(udp) if self.udp_needed() => Some(UdpIngest::bind(udp).await?),
            _ => None,
        };

        tokio::select! {
            _ = shutdown => info!("Shutting down"),
            _ = receive(ingest.as_ref(), &monitors) => {}
        }

        monitors.stop().await;
        Ok(())
    }

    fn udp_needed(&self) -> bool {
        self.config
            .reporters()
            .any(|reporter| reporter.enabled && reporter.kind.fed_by_udp())
    }
}

async fn receive(ingest: Option<&UdpIngest>, monitors: &Monitors) {
    match ingest {
        Some(ingest) => ingest.run(monitors).await,
        None => std::future::pending().await,
    }
}
