//! Event publishers (§4.A): small producers sharing one broker connection profile,
//! each responsible for exactly one topic.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::model::{ErrorEvent, Heartbeat, JobKey, JobRequest, ResultEnvelope, ResultEvent, Status, StatusEvent};

const SEND_TIMEOUT: Timeout = Timeout::After(Duration::from_secs(5));

/// Builds a `ClientConfig` carrying the broker connection profile common to every
/// producer and consumer: endpoints, security protocol, SASL mechanism, credentials.
pub fn client_config(config: &DispatchConfig, client_id: String) -> ClientConfig {
    let mut cfg = ClientConfig::new();
    cfg.set("bootstrap.servers", &config.bootstrap_servers)
        .set("client.id", &client_id)
        .set("security.protocol", &config.kafka_security_protocol)
        .set("message.timeout.ms", "5000");

    if let Some(mechanism) = &config.kafka_sasl_mechanism {
        cfg.set("sasl.mechanism", mechanism);
        if let Some(username) = &config.kafka_username {
            cfg.set("sasl.username", username);
        }
        if let Some(password) = &config.kafka_password {
            cfg.set("sasl.password", password);
        }
    }

    cfg
}

fn new_producer(config: &DispatchConfig, role: &str) -> Result<FutureProducer> {
    client_config(config, config.client_id(role))
        .create()
        .map_err(DispatchError::from)
}

/// Publishes `StatusEvent`s to `TOPIC_STATUS`, including tombstones via `remove`.
pub struct StatusSender {
    producer: FutureProducer,
    topic: String,
    cluster: String,
}

impl StatusSender {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        Ok(Self {
            producer: new_producer(config, "status")?,
            topic: config.topic_status.clone(),
            cluster: config.cluster_name.clone(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn send(
        &self,
        job_key: &JobKey,
        status: Status,
        job_id: Option<String>,
        node: Option<String>,
        error: Option<String>,
        message: Option<String>,
    ) -> Result<()> {
        let mut event = StatusEvent::new(status, self.cluster.clone());
        event.job_id = job_id;
        event.node = node;
        event.error = error;
        event.message = message;
        let payload = serde_json::to_vec(&event)?;
        self.publish(job_key, Some(payload)).await
    }

    /// Emits a tombstone (null value) for `job_key`, deleting monitor state.
    pub async fn remove(&self, job_key: &JobKey) -> Result<()> {
        self.publish(job_key, None).await
    }

    async fn publish(&self, job_key: &JobKey, payload: Option<Vec<u8>>) -> Result<()> {
        let record = match &payload {
            Some(bytes) => FutureRecord::to(&self.topic).key(job_key).payload(bytes),
            None => FutureRecord::<String, Vec<u8>>::to(&self.topic)
                .key(job_key),
        };
        self.producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(err, _)| DispatchError::from(err))?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.producer
            .flush(Duration::from_secs(10))
            .map_err(DispatchError::from)
    }
}

/// Publishes `ResultEvent`s to `TOPIC_DONE`.
pub struct ResultSender {
    producer: FutureProducer,
    topic: String,
    cluster: String,
}

impl ResultSender {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        Ok(Self {
            producer: new_producer(config, "result")?,
            topic: config.topic_done.clone(),
            cluster: config.cluster_name.clone(),
        })
    }

    pub async fn send(
        &self,
        job_key: &JobKey,
        job_id: impl Into<String>,
        node: impl Into<String>,
        payload: std::collections::HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        let event = ResultEvent {
            results: ResultEnvelope {
                payload,
                timestamp: crate::model::local_timestamp(),
                job_id: job_id.into(),
                node: node.into(),
                cluster: self.cluster.clone(),
            },
        };
        let bytes = serde_json::to_vec(&event)?;
        self.producer
            .send(
                FutureRecord::to(&self.topic).key(job_key).payload(&bytes),
                SEND_TIMEOUT,
            )
            .await
            .map_err(|(err, _)| DispatchError::from(err))?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.producer
            .flush(Duration::from_secs(10))
            .map_err(DispatchError::from)
    }
}

/// Publishes `ErrorEvent`s to `TOPIC_ERROR`.
pub struct ErrorSender {
    producer: FutureProducer,
    topic: String,
    cluster: String,
}

impl ErrorSender {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        Ok(Self {
            producer: new_producer(config, "error")?,
            topic: config.topic_error.clone(),
            cluster: config.cluster_name.clone(),
        })
    }

    pub async fn send(
        &self,
        job_key: &JobKey,
        job_id: impl Into<String>,
        node: impl Into<String>,
        payload: std::collections::HashMap<String, serde_json::Value>,
        error: impl Into<String>,
    ) -> Result<()> {
        let event = ErrorEvent {
            results: ResultEnvelope {
                payload,
                timestamp: crate::model::local_timestamp(),
                job_id: job_id.into(),
                node: node.into(),
                cluster: self.cluster.clone(),
            },
            error: error.into(),
        };
        let bytes = serde_json::to_vec(&event)?;
        self.producer
            .send(
                FutureRecord::to(&self.topic).key(job_key).payload(&bytes),
                SEND_TIMEOUT,
            )
            .await
            .map_err(|(err, _)| DispatchError::from(err))?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.producer
            .flush(Duration::from_secs(10))
            .map_err(DispatchError::from)
    }
}

/// Publishes `JobRequest`s to `TOPIC_NEW`, used by the submitter only.
pub struct JobSender {
    producer: FutureProducer,
    topic: String,
}

impl JobSender {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        Ok(Self {
            producer: new_producer(config, "submitter")?,
            topic: config.topic_new.clone(),
        })
    }

    pub async fn send(&self, job_key: &JobKey, request: &JobRequest) -> Result<()> {
        let bytes = serde_json::to_vec(request)?;
        self.producer
            .send(
                FutureRecord::to(&self.topic).key(job_key).payload(&bytes),
                SEND_TIMEOUT,
            )
            .await
            .map_err(|(err, _)| DispatchError::from(err))?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.producer
            .flush(Duration::from_secs(10))
            .map_err(DispatchError::from)
    }
}

/// Emits `Heartbeat`s to `TOPIC_HEARTBEAT`, keyed by cluster name.
pub struct HeartbeatSender {
    producer: FutureProducer,
    topic: String,
    cluster: String,
}

impl HeartbeatSender {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        Ok(Self {
            producer: new_producer(config, "heartbeat")?,
            topic: config.topic_heartbeat.clone(),
            cluster: config.cluster_name.clone(),
        })
    }

    pub async fn send(&self) -> Result<()> {
        let bytes = serde_json::to_vec(&Heartbeat::now())?;
        self.producer
            .send(
                FutureRecord::to(&self.topic).key(&self.cluster).payload(&bytes),
                SEND_TIMEOUT,
            )
            .await
            .map_err(|(err, _)| DispatchError::from(err))?;
        Ok(())
    }

    /// Runs until cancelled, sending a heartbeat every `interval`. The caller is
    /// expected to check `DispatchConfig::heartbeat_enabled` before spawning this.
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.send().await {
                tracing::warn!(error = %err, "heartbeat send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_sets_expected_client_id() {
        let config = DispatchConfig::default();
        let client = client_config(&config, config.client_id("status"));
        assert_eq!(client.get("client.id"), Some("my_cluster_status"));
        assert_eq!(client.get("security.protocol"), Some("PLAINTEXT"));
    }

    #[test]
    fn client_config_applies_sasl_credentials_when_configured() {
        let mut config = DispatchConfig::default();
        config.kafka_sasl_mechanism = Some("PLAIN".to_string());
        config.kafka_username = Some("agent".to_string());
        config.kafka_password = Some("secret".to_string());
        let client = client_config(&config, config.client_id("status"));
        assert_eq!(client.get("sasl.mechanism"), Some("PLAIN"));
        assert_eq!(client.get("sasl.username"), Some("agent"));
    }
}
