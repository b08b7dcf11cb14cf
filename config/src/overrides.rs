use crate::{
    sections::{
        ConfigTree,
        MonitorServerSection,
        ReporterSection,
        UdpServerSection,
    },
    settings::Extra,
    ReporterKind,
};
use config::{
    Map,
    Source,
    Value,
};
use serde::Serialize;

/// Explicit, caller supplied overrides: the highest priority configuration layer.
///
/// Only the keys that are set take part in the merge; nested sections merge key
/// by key with the lower layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigOverrides {
    #[serde(flatten)]
    pub sections: ConfigTree,
    /// Keys no section knows about. They are merged and kept, never rejected.
    #[serde(flatten)]
    pub extra: Extra,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn udp_server(mut self, section: UdpServerSection) -> Self {
        self.sections.udp_server = Some(section);
        self
    }

    pub fn monitor_server(mut self, section: MonitorServerSection) -> Self {
        self.sections.monitor_server = Some(section);
        self
    }

    pub fn reporter(mut self, kind: ReporterKind, section: ReporterSection) -> Self {
        *self.sections.reporter_mut(kind) = section;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl From<ConfigTree> for ConfigOverrides {
    fn from(sections: ConfigTree) -> Self {
        Self {
            sections,
            extra: Extra::new(),
        }
    }
}

impl Source for ConfigOverrides {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new((*self).clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
        config::Config::try_from(self)?.collect()
    }
}
