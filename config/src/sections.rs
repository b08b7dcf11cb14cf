//! The merge tree.
//!
//! Every field is optional so that each layer (defaults, file, environment,
//! explicit overrides) only carries the keys it actually sets. Validation turns
//! the merged tree into the typed settings in [`crate::settings`].

use crate::{
    settings::OverflowPolicy,
    ReporterKind,
    Secret,
    TelemetryType,
    TelemetryTypes,
};
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UdpServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
}

impl UdpServerSection {
    pub(crate) const FIELDS: &'static [&'static str] = &["host", "port", "buffer_size"];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_host: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_timeout: Option<f64>,
}

impl MonitorServerSection {
    pub(crate) const FIELDS: &'static [&'static str] =
        &["url", "username", "password", "service_host", "req_timeout"];
}

/// One `*_reporter` section. Which fields are mandatory depends on the reporter kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReporterSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tlm_type: Option<TelemetryTypes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Minutes between two flush cycles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_t: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_t: Option<f64>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_tlms: Option<Vec<TelemetryType>>,
    /// Seconds between two probes of the source, for reporters that probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_interval: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow_policy: Option<OverflowPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_capacity: Option<usize>,
}

impl ReporterSection {
    pub(crate) const FIELDS: &'static [&'static str] = &[
        "tlm_type",
        "enabled",
        "frequency",
        "warning_t",
        "critical_t",
        "req_timeout",
        "member_urls",
        "sub_tlms",
        "probe_interval",
        "overflow_policy",
        "buffer_capacity",
    ];

    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp_server: Option<UdpServerSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_server: Option<MonitorServerSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aviso_rest_reporter: Option<ReporterSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aviso_auth_reporter: Option<ReporterSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd_reporter: Option<ReporterSection>,
}

impl ConfigTree {
    pub(crate) const UDP_SERVER: &'static str = "udp_server";
    pub(crate) const MONITOR_SERVER: &'static str = "monitor_server";

    pub fn reporter(&self, kind: ReporterKind) -> Option<&ReporterSection> {
        match kind {
            ReporterKind::AvisoRest => self.aviso_rest_reporter.as_ref(),
            ReporterKind::AvisoAuth => self.aviso_auth_reporter.as_ref(),
            ReporterKind::Etcd => self.etcd_reporter.as_ref(),
        }
    }

    pub fn reporter_mut(&mut self, kind: ReporterKind) -> &mut ReporterSection {
        let section = match kind {
            ReporterKind::AvisoRest => &mut self.aviso_rest_reporter,
            ReporterKind::AvisoAuth => &mut self.aviso_auth_reporter,
            ReporterKind::Etcd => &mut self.etcd_reporter,
        };
        section.get_or_insert_with(Default::default)
    }

    /// Known fields of the given top-level section, `None` for unknown sections.
    pub(crate) fn fields_of(section: &str) -> Option<&'static [&'static str]> {
        match section {
            Self::UDP_SERVER => Some(UdpServerSection::FIELDS),
            Self::MONITOR_SERVER => Some(MonitorServerSection::FIELDS),
            other if ReporterKind::from_section(other).is_some() => Some(ReporterSection::FIELDS),
            _ => None,
        }
    }
}
