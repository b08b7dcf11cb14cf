use aviso_monitoring_collector::{
    TelemetryRecord,
    TelemetrySink,
    TransmitError,
};
use aviso_monitoring_config::{
    MonitorServerConfig,
    Secret,
};
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};
use url::Url;

/// Posts telemetry records as JSON to the monitoring server.
#[derive(Debug, Clone)]
pub struct MonitorClient {
    client: reqwest::Client,
    url: Url,
    username: String,
    password: Secret,
    timeout: Duration,
}

impl MonitorClient {
    pub fn new(config: &MonitorServerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.req_timeout).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.req_timeout,
        })
    }

    /// Any 2xx answer is a success.
    pub async fn post(&self, record: &TelemetryRecord) -> Result<(), TransmitError> {
        debug!(url = %self.url, status = %record.status, "Posting telemetry");
        let response = self
            .client
            .post(self.url.clone())
            .basic_auth(&self.username, Some(self.password.expose()))
            .json(record)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    TransmitError::Timeout(self.timeout)
                } else {
                    TransmitError::Request(Box::new(err))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransmitError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

impl TelemetrySink for MonitorClient {
    fn send<'a>(
        &'a self,
        record: &'a TelemetryRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransmitError>> + Send + 'a>> {
        Box::pin(self.post(record))
    }
}
