//! Posting notifications to user endpoints.
//!
//! A trigger is configured as
//!
//! ```yaml
//! protocol:
//!   type: cloudevent
//!   url: https://example.int/hook
//!   timeout: 30          # seconds, default 60
//!   headers:
//!     Authorization: Bearer abc
//!   cloudevent:
//!     type: aviso        # default
//!     source: https://aviso.ecmwf.int
//! ```

use chrono::Utc;
use reqwest::header::{
    HeaderMap,
    HeaderName,
    HeaderValue,
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
    EnumString,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

const DEFAULT_TIMEOUT_SECS: f64 = 60.0;
const DEFAULT_TYPE: &str = "aviso";
const DEFAULT_SOURCE: &str = "https://aviso.ecmwf.int";
const SPEC_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("{0} is a mandatory field")]
    MissingField(&'static str),

    #[error("Unknown trigger protocol {0:?}")]
    UnknownProtocol(String),

    #[error("Invalid trigger parameters: {0}")]
    InvalidParams(#[from] serde_json::Error),

    #[error("Invalid header {0:?}")]
    InvalidHeader(String),

    #[error("Invalid timeout {0}, expected a positive number of seconds")]
    InvalidTimeout(f64),

    #[error("Not able to POST CloudEvent notification to {url}: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("Not able to POST CloudEvent notification to {url}, status {status}: {body}")]
    Status { url: Url, status: u16, body: String },
}

/// Protocols a post trigger can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProtocolType {
    CloudEvent,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloudEventParams {
    pub url: Url,
    /// Seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub cloudevent: CloudEventAttributes,
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloudEventAttributes {
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for CloudEventAttributes {
    fn default() -> Self {
        Self {
            kind: default_type(),
            source: default_source(),
        }
    }
}

fn default_type() -> String {
    DEFAULT_TYPE.to_string()
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

/// CloudEvents 1.0 envelope, JSON format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
    pub datacontenttype: String,
    pub id: String,
    pub source: String,
    pub specversion: String,
    pub time: String,
}

impl CloudEvent {
    pub fn new(attributes: &CloudEventAttributes, data: serde_json::Value) -> Self {
        Self {
            kind: attributes.kind.clone(),
            data,
            datacontenttype: "application/json".to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            source: attributes.source.clone(),
            specversion: SPEC_VERSION.to_string(),
            time: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum Protocol {
    CloudEvent {
        url: Url,
        headers: HeaderMap,
        attributes: CloudEventAttributes,
    },
}

/// Posts notifications with the protocol selected in its parameters.
#[derive(Debug, Clone)]
pub struct PostTrigger {
    client: reqwest::Client,
    protocol: Protocol,
}

impl PostTrigger {
    /// Parses the trigger parameters. The protocol type is matched case-insensitively.
    pub fn from_params(params: &serde_json::Value) -> Result<Self, TriggerError> {
        let protocol = params.get("protocol").ok_or(TriggerError::MissingField("protocol"))?;
        let kind = protocol
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(TriggerError::MissingField("protocol type"))?;
        let kind = kind
            .parse::<ProtocolType>()
            .map_err(|_| TriggerError::UnknownProtocol(kind.to_string()))?;

        match kind {
            ProtocolType::CloudEvent => {
                if protocol.get("url").is_none() {
                    return Err(TriggerError::MissingField("url"));
                }
                let params: CloudEventParams = serde_json::from_value(protocol.clone())?;
                Self::cloud_event(params)
            }
        }
    }

    pub fn cloud_event(params: CloudEventParams) -> Result<Self, TriggerError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &params.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| TriggerError::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value).map_err(|_| TriggerError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }
        let timeout = Duration::try_from_secs_f64(params.timeout)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or(TriggerError::InvalidTimeout(params.timeout))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| TriggerError::Request {
                url: params.url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            protocol: Protocol::CloudEvent {
                url: params.url,
                headers,
                attributes: params.cloudevent,
            },
        })
    }

    pub fn protocol_type(&self) -> ProtocolType {
        match self.protocol {
            Protocol::CloudEvent { .. } => ProtocolType::CloudEvent,
        }
    }

    /// Posts `notification` and waits for the answer. Only `200 OK` is a success.
    pub async fn execute(&self, notification: serde_json::Value) -> Result<(), TriggerError> {
        info!(protocol = %self.protocol_type(), "Starting post trigger");
        match &self.protocol {
            Protocol::CloudEvent {
                url,
                headers,
                attributes,
            } => {
                let event = CloudEvent::new(attributes, notification);
                debug!(?event, "Sending CloudEvent notification");

                let response = self
                    .client
                    .post(url.clone())
                    .headers(headers.clone())
                    .json(&event)
                    .send()
                    .await
                    .map_err(|source| TriggerError::Request {
                        url: url.clone(),
                        source,
                    })?;
                let status = response.status();
                if status != reqwest::StatusCode::OK {
                    let body = response.text().await.unwrap_or_default();
                    return Err(TriggerError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                        body,
                    });
                }
            }
        }
        debug!("Post trigger completed");
        Ok(())
    }

    /// Runs [`Self::execute`] in the background, logging failures.
    pub fn spawn(&self, notification: serde_json::Value) -> JoinHandle<()> {
        let trigger = self.clone();
        tokio::task::spawn(async move {
            if let Err(err) = trigger.execute(notification).await {
                error!("Post trigger failed: {err}");
            }
        })
    }
}
