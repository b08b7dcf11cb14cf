use crate::{
    Secret,
    TelemetryType,
    TelemetryTypes,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    time::Duration,
};
use strum::{
    Display,
    EnumIter,
    EnumString,
    IntoEnumIterator,
    IntoStaticStr,
};
use url::Url;

/// Keys found in the merged configuration that no section knows about.
pub type Extra = BTreeMap<String, serde_json::Value>;

/// The closed set of reporters this service knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString, IntoStaticStr)]
pub enum ReporterKind {
    #[strum(to_string = "aviso_rest_reporter", serialize = "aviso_rest", serialize = "rest")]
    AvisoRest,
    #[strum(to_string = "aviso_auth_reporter", serialize = "aviso_auth", serialize = "auth")]
    AvisoAuth,
    #[strum(to_string = "etcd_reporter", serialize = "etcd")]
    Etcd,
}

impl ReporterKind {
    /// Name of the configuration section of this reporter.
    pub fn section(self) -> &'static str {
        self.into()
    }

    pub fn from_section(section: &str) -> Option<Self> {
        Self::iter().find(|kind| kind.section() == section)
    }

    /// Reporters whose measurements arrive through the UDP listener.
    pub fn fed_by_udp(self) -> bool {
        matches!(self, Self::AvisoRest | Self::AvisoAuth)
    }
}

/// What a measurement buffer does when it is full.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    Unbounded,
    DropOldest,
    DropNewest,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    #[default]
    Unbounded,
    DropOldest { capacity: usize },
    DropNewest { capacity: usize },
}

impl BufferPolicy {
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::DropOldest { capacity } | Self::DropNewest { capacity } => Some(*capacity),
        }
    }
}

/// Warning and critical levels, in the natural unit of the reporter's primary metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(rename = "warning_t")]
    pub warning: f64,
    #[serde(rename = "critical_t")]
    pub critical: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UdpServerConfig {
    pub host: String,
    pub port: u16,
    pub buffer_size: usize,
    pub extra: Extra,
}

impl UdpServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorServerConfig {
    pub url: Url,
    pub username: String,
    pub password: Secret,
    pub service_host: String,
    pub req_timeout: Duration,
    pub extra: Extra,
}

/// Validated settings of one reporter.
///
/// For a disabled reporter only `enabled` is guaranteed to come from the
/// configuration; fields that were missing hold empty values and are never used.
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterConfig {
    pub kind: ReporterKind,
    pub enabled: bool,
    pub tlm_type: TelemetryTypes,
    pub frequency: Duration,
    pub thresholds: Option<Thresholds>,
    pub req_timeout: Option<Duration>,
    pub member_urls: Vec<Url>,
    pub sub_tlms: Vec<TelemetryType>,
    pub probe_interval: Duration,
    pub buffer: BufferPolicy,
    pub extra: Extra,
}

impl ReporterConfig {
    pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);

    /// Whether measurements with this tag belong to the reporter.
    pub fn accepts(&self, tag: &TelemetryType) -> bool {
        self.tlm_type.contains(tag) || self.sub_tlms.contains(tag)
    }
}
