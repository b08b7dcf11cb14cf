use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// Tag identifying one kind of telemetry, e.g. `rest_resp_time` or `etcd_store_size`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryType(String);

impl TelemetryType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TelemetryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TelemetryType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for TelemetryType {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// The `tlm_type` of a reporter: either a single tag or a list of tags.
///
/// The first tag is the reporter's primary telemetry type, the one thresholds apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryTypes {
    One(TelemetryType),
    Many(Vec<TelemetryType>),
}

impl Default for TelemetryTypes {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl TelemetryTypes {
    pub fn as_slice(&self) -> &[TelemetryType] {
        match self {
            Self::One(tag) => std::slice::from_ref(tag),
            Self::Many(tags) => tags,
        }
    }

    pub fn primary(&self) -> Option<&TelemetryType> {
        self.as_slice().first()
    }

    pub fn contains(&self, tag: &TelemetryType) -> bool {
        self.as_slice().contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<&str> for TelemetryTypes {
    fn from(tag: &str) -> Self {
        Self::One(tag.into())
    }
}

impl From<Vec<&str>> for TelemetryTypes {
    fn from(tags: Vec<&str>) -> Self {
        Self::Many(tags.into_iter().map(TelemetryType::from).collect())
    }
}

impl fmt::Display for TelemetryTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags = self.as_slice().iter().map(TelemetryType::as_str).collect::<Vec<_>>();
        f.write_str(&tags.join(","))
    }
}
