use crate::ReporterKind;
use clap::Parser;
use std::path::PathBuf;

/// Collects aviso telemetry and reports it to the monitoring server.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// YAML file layered on top of the built-in defaults.
    /// Defaults to `config.yaml` in the config directory, if present.
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// URL of the monitoring server receiving the telemetry.
    #[clap(long, value_name = "URL")]
    pub monitor_url: Option<String>,

    /// User name for the monitoring server.
    #[clap(long, value_name = "USER")]
    pub monitor_username: Option<String>,

    /// Password for the monitoring server.
    #[clap(long, value_name = "PASSWORD")]
    pub monitor_password: Option<String>,

    /// Host name the telemetry is reported for.
    #[clap(long, value_name = "HOST")]
    pub service_host: Option<String>,

    /// Address the UDP listener binds to.
    #[clap(long, value_name = "HOST")]
    pub udp_host: Option<String>,

    /// Port the UDP listener binds to.
    #[clap(long, value_name = "PORT")]
    pub udp_port: Option<u16>,

    /// Enables a reporter (`rest`, `auth` or `etcd`). Can be repeated.
    #[clap(long = "enable", value_name = "REPORTER")]
    pub enable: Vec<ReporterKind>,

    /// Disables a reporter (`rest`, `auth` or `etcd`). Can be repeated.
    #[clap(long = "disable", value_name = "REPORTER")]
    pub disable: Vec<ReporterKind>,

    /// Enables debug logging.
    #[clap(short, long, action)]
    pub verbose: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(url) = &self.monitor_url {
                cache.insert("monitor_server.url".to_string(), url.clone().into());
            }
            if let Some(username) = &self.monitor_username {
                cache.insert("monitor_server.username".to_string(), username.clone().into());
            }
            if let Some(password) = &self.monitor_password {
                cache.insert("monitor_server.password".to_string(), password.clone().into());
            }
            if let Some(service_host) = &self.service_host {
                cache.insert("monitor_server.service_host".to_string(), service_host.clone().into());
            }
            if let Some(host) = &self.udp_host {
                cache.insert("udp_server.host".to_string(), host.clone().into());
            }
            if let Some(port) = self.udp_port {
                cache.insert("udp_server.port".to_string(), (port as u64).into());
            }
            for kind in &self.enable {
                cache.insert(format!("{}.enabled", kind.section()), true.into());
            }
            // disabling wins when a reporter is named in both lists
            for kind in &self.disable {
                cache.insert(format!("{}.enabled", kind.section()), false.into());
            }
            Ok(cache.into_iter().collect())
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();

    format!(
        "\
Authors: {author}

Config directory: {config_dir_path}"
    )
}
