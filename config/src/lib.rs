#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod error;
mod overrides;
mod secret;
pub mod sections;
mod settings;
mod telemetry_type;
mod validate;

pub use app_config::get_config_dir;
pub use args::Args;
pub use error::{
    ConfigError,
    Problem,
};
pub use overrides::ConfigOverrides;
pub use secret::Secret;
pub use settings::{
    BufferPolicy,
    Extra,
    MonitorServerConfig,
    OverflowPolicy,
    ReporterConfig,
    ReporterKind,
    ReporterKindIter,
    Thresholds,
    UdpServerConfig,
};
pub use telemetry_type::{
    TelemetryType,
    TelemetryTypes,
};

use config::{
    Environment,
    File,
    FileFormat,
    Source,
};
use sections::ConfigTree;
use std::{
    collections::HashMap,
    path::PathBuf,
};
use strum::IntoEnumIterator as _;

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

/// Prefix of the environment variables read by [`ConfigLoader`],
/// e.g. `AVISO_MONITORING_MONITOR_SERVER__PASSWORD`.
pub const ENV_PREFIX: &str = "AVISO_MONITORING";

/// Environment keys holding comma separated lists.
const ENV_LIST_KEYS: &[&str] = &[
    "etcd_reporter.member_urls",
    "etcd_reporter.tlm_type",
    "aviso_auth_reporter.sub_tlms",
];

/// Fully resolved and validated configuration.
///
/// `udp_server` and `monitor_server` are `None` only when no reporter needs
/// them and their merged values were unusable.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub udp_server: Option<UdpServerConfig>,
    pub monitor_server: Option<MonitorServerConfig>,
    pub aviso_rest_reporter: ReporterConfig,
    pub aviso_auth_reporter: ReporterConfig,
    pub etcd_reporter: ReporterConfig,
    /// Top-level sections nobody knows about.
    pub extra: Extra,
}

impl Config {
    pub fn reporter(&self, kind: ReporterKind) -> &ReporterConfig {
        match kind {
            ReporterKind::AvisoRest => &self.aviso_rest_reporter,
            ReporterKind::AvisoAuth => &self.aviso_auth_reporter,
            ReporterKind::Etcd => &self.etcd_reporter,
        }
    }

    pub fn reporters(&self) -> impl Iterator<Item = &ReporterConfig> {
        [&self.aviso_rest_reporter, &self.aviso_auth_reporter, &self.etcd_reporter].into_iter()
    }

    pub fn any_reporter_enabled(&self) -> bool {
        self.reporters().any(|reporter| reporter.enabled)
    }

    /// Validates a merged tree. `unknown` is the merged configuration as a JSON
    /// object, used to collect the keys the typed sections do not know about.
    fn validate(tree: &ConfigTree, unknown: &serde_json::Value) -> Result<Self, ConfigError> {
        let (extra, mut section_extra) = split_unknown_keys(unknown);
        let mut take_extra = |section: &str| section_extra.remove(section).unwrap_or_default();
        let mut problems = Vec::new();

        let is_enabled = |kind: ReporterKind| tree.reporter(kind).and_then(|section| section.enabled) == Some(true);
        let monitor_active = ReporterKind::iter().any(is_enabled);
        let udp_active = ReporterKind::iter().filter(|kind| kind.fed_by_udp()).any(is_enabled);

        let udp_server = active_or_lenient(
            validate::udp_server(tree.udp_server.as_ref(), take_extra(ConfigTree::UDP_SERVER)),
            udp_active,
            &mut problems,
        );
        let monitor_server = active_or_lenient(
            validate::monitor_server(tree.monitor_server.as_ref(), take_extra(ConfigTree::MONITOR_SERVER)),
            monitor_active,
            &mut problems,
        );

        let mut reporter = |kind: ReporterKind| {
            match validate::reporter(kind, tree.reporter(kind), take_extra(kind.section())) {
                Ok(reporter) => Some(reporter),
                Err(found) => {
                    problems.extend(found);
                    None
                }
            }
        };
        let rest = reporter(ReporterKind::AvisoRest);
        let auth = reporter(ReporterKind::AvisoAuth);
        let etcd = reporter(ReporterKind::Etcd);

        match (rest, auth, etcd) {
            (Some(aviso_rest_reporter), Some(aviso_auth_reporter), Some(etcd_reporter)) if problems.is_empty() => {
                Ok(Self {
                    udp_server,
                    monitor_server,
                    aviso_rest_reporter,
                    aviso_auth_reporter,
                    etcd_reporter,
                    extra,
                })
            }
            _ => Err(ConfigError::Invalid(problems)),
        }
    }
}

/// An active section must be valid, an inactive one is kept only if it happens to be.
fn active_or_lenient<T>(result: Result<T, Vec<Problem>>, active: bool, problems: &mut Vec<Problem>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(found) if active => {
            problems.extend(found);
            None
        }
        Err(_) => None,
    }
}

/// Splits the keys unknown to the typed sections into top-level extras and
/// per-section extras.
fn split_unknown_keys(merged: &serde_json::Value) -> (Extra, HashMap<String, Extra>) {
    let mut top = Extra::new();
    let mut per_section = HashMap::new();
    let Some(merged) = merged.as_object() else {
        return (top, per_section);
    };
    for (key, value) in merged {
        match (ConfigTree::fields_of(key), value) {
            (Some(fields), serde_json::Value::Object(section)) => {
                let extra = section
                    .iter()
                    .filter(|(field, _)| !fields.contains(&field.as_str()))
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect::<Extra>();
                per_section.insert(key.clone(), extra);
            }
            (Some(_), _) => {}
            (None, _) => {
                top.insert(key.clone(), value.clone());
            }
        }
    }
    (top, per_section)
}

/// Builds the layered configuration: embedded defaults, an optional YAML file,
/// the environment and finally the explicit overrides.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    defaults: String,
    file: Option<PathBuf>,
    file_required: bool,
    environment: Environment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Embedded defaults and the process environment, no file.
    pub fn new() -> Self {
        Self {
            defaults: DEFAULT_CONFIG.to_string(),
            file: None,
            file_required: false,
            environment: environment(),
        }
    }

    /// Replaces the embedded defaults with another YAML document.
    pub fn with_defaults(mut self, yaml: impl Into<String>) -> Self {
        self.defaults = yaml.into();
        self
    }

    /// Layers a YAML file that must exist.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self.file_required = true;
        self
    }

    /// Layers `config.yaml` from the config directory, if there is one.
    pub fn with_user_config(mut self) -> Self {
        self.file = Some(get_config_dir().join("config.yaml"));
        self.file_required = false;
        self
    }

    /// Reads the environment layer from `vars` instead of the process environment.
    pub fn with_environment(mut self, vars: HashMap<String, String>) -> Self {
        self.environment = environment().source(Some(vars.into_iter().collect()));
        self
    }

    /// Merges every layer without validating the result.
    pub fn merge<S>(&self, overrides: S) -> Result<config::Config, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let mut builder =
            config::Config::builder().add_source(File::from_str(&self.defaults, FileFormat::Yaml));

        if let Some(path) = &self.file {
            debug!(path = %path.display(), required = self.file_required, "Layering configuration file");
            builder = builder.add_source(
                File::from(path.clone())
                    .format(FileFormat::Yaml)
                    .required(self.file_required),
            );
        }

        builder = builder.add_source(self.environment.clone()).add_source(overrides);

        Ok(builder.build()?)
    }

    /// Merges every layer and validates the result.
    ///
    /// All sections are validated, so the error lists every problem at once.
    pub fn resolve<S>(&self, overrides: S) -> Result<Config, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let merged = self.merge(overrides)?;
        let tree: ConfigTree = merged.clone().try_deserialize()?;
        let unknown: serde_json::Value = merged.try_deserialize()?;

        let config = Config::validate(&tree, &unknown)?;
        debug!(?config, "Resolved configuration");
        Ok(config)
    }
}

fn environment() -> Environment {
    ENV_LIST_KEYS.iter().fold(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(","),
        |environment, key| environment.with_list_parse_key(key),
    )
}

/// Resolves the configuration from the embedded defaults, the process
/// environment and `overrides`.
pub fn resolve(overrides: ConfigOverrides) -> Result<Config, ConfigError> {
    ConfigLoader::new().resolve(overrides)
}
