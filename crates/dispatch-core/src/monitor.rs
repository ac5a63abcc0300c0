//! HTTP client for the external monitor (§6), used by the submitter to suppress
//! resubmission of jobs whose status is already known.

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{DispatchError, Result};
use crate::model::JobKey;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MonitorStatus {
    pub status: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Thin wrapper over `reqwest` performing the monitor's single status-check endpoint.
/// Unlike the original tool, which parses a loose mapping literal, this client requires
/// strict JSON and fails closed on any deviation (per the REDESIGN FLAGS guidance).
pub struct MonitorClient {
    client: reqwest::Client,
    base_url: String,
    context_path: String,
}

impl MonitorClient {
    pub fn new(base_url: impl Into<String>, context_path: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            context_path: context_path.into(),
        }
    }

    /// `GET <MONITOR_AGENT_URL><MONITOR_AGENT_CONTEXT_PATH>check/<job_key>/`.
    ///
    /// Returns `None` when the monitor reports no known status for `job_key` (a JSON
    /// `null` under that key); any network or parse failure is a `DispatchError::Monitor`.
    pub async fn check_status(&self, job_key: &JobKey) -> Result<Option<MonitorStatus>> {
        let url = format!(
            "{}{}check/{}/",
            self.base_url.trim_end_matches('/'),
            self.context_path,
            job_key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| DispatchError::Monitor(err.to_string()))?;

        if !response.status().is_success() {
            return Err(DispatchError::Monitor(format!(
                "monitor returned HTTP {}",
                response.status()
            )));
        }

        let body: HashMap<String, Option<MonitorStatus>> = response
            .json()
            .await
            .map_err(|err| DispatchError::Monitor(format!("unparseable monitor response: {err}")))?;

        match body.get(job_key) {
            Some(status) => Ok(status.clone()),
            None => Err(DispatchError::Monitor(format!(
                "monitor response missing key {job_key}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn known_status_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check/K7/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "K7": {"status": "DONE"}
            })))
            .mount(&server)
            .await;

        let client = MonitorClient::new(server.uri(), "/");
        let status = client.check_status(&"K7".to_string()).await.unwrap();
        assert_eq!(status.unwrap().status, "DONE");
    }

    #[tokio::test]
    async fn unknown_status_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check/NEWKEY/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "NEWKEY": null
            })))
            .mount(&server)
            .await;

        let client = MonitorClient::new(server.uri(), "/");
        let status = client.check_status(&"NEWKEY".to_string()).await.unwrap();
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_a_monitor_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check/K9/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = MonitorClient::new(server.uri(), "/");
        let err = client.check_status(&"K9".to_string()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Monitor(_)));
    }
}
