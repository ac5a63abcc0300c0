//! The `NEW`-topic consumer shared by both dispatch agents: manual-commit,
//! at-least-once polling with a small per-tick budget (§5, §6).

use std::time::Duration;

use rdkafka::client::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::{Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::Message;
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::ClientConfig;
use tokio_stream::StreamExt;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::events::client_config;
use crate::model::JobRequest;

/// Logs partition assignment changes; mirrors the logging-only context used by the
/// Kafka consumer wrappers this module is grounded on.
pub struct DispatchContext;

impl ClientContext for DispatchContext {}

impl ConsumerContext for DispatchContext {
    fn pre_rebalance(&self, rebalance: &Rebalance) {
        tracing::debug!(?rebalance, "pre rebalance");
    }

    fn post_rebalance(&self, rebalance: &Rebalance) {
        tracing::debug!(?rebalance, "post rebalance");
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        if let Err(err) = result {
            tracing::warn!(error = %err, ?offsets, "commit failed");
        }
    }
}

type LoggingConsumer = StreamConsumer<DispatchContext>;

/// Wraps the `TOPIC_NEW` consumer used by both the Worker Agent and the Cluster Agent.
pub struct NewTopicConsumer {
    consumer: LoggingConsumer,
}

impl NewTopicConsumer {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let mut client_config = client_config(config, config.client_id("new_consumer"));
        client_config
            .set("group.id", config.new_group())
            .set("enable.auto.commit", "false")
            .set_log_level(RDKafkaLogLevel::Info);

        let consumer: LoggingConsumer = client_config
            .create_with_context(DispatchContext)
            .map_err(|err| DispatchError::Poll(err.to_string()))?;

        consumer
            .subscribe(&[&config.topic_new])
            .map_err(|err| DispatchError::Poll(err.to_string()))?;

        Ok(Self { consumer })
    }

    /// Polls up to `budget` records from `TOPIC_NEW` within a single bounded window of
    /// `timeout`, returning immediately once `budget` is satisfied, the topic runs dry,
    /// or the window elapses — mirroring a single `poll(max_records, timeout_ms)` call
    /// rather than re-arming a fresh `timeout` per record. Malformed records are logged
    /// and skipped rather than failing the tick.
    pub async fn poll_batch(&self, budget: usize, timeout: Duration) -> Result<Vec<JobRequest>> {
        if budget == 0 {
            return Ok(Vec::new());
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut batch = Vec::with_capacity(budget);
        let mut stream = self.consumer.stream();

        while batch.len() < budget {
            match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(Ok(message))) => {
                    let Some(payload) = message.payload() else {
                        continue;
                    };
                    match serde_json::from_slice::<JobRequest>(payload) {
                        Ok(job) => batch.push(job),
                        Err(err) => {
                            tracing::warn!(error = %err, "dropping unparseable NEW record");
                        }
                    }
                }
                Ok(Some(Err(err))) => return Err(DispatchError::Poll(err.to_string())),
                Ok(None) | Err(_) => break,
            }
        }

        Ok(batch)
    }

    /// Commits consumer offsets for everything polled so far. Callers must only invoke
    /// this after every record in the tick's batch was dispatched without exception.
    /// A tick that polled zero records has nothing to commit and is not an error.
    pub fn commit(&self) -> Result<()> {
        match self
            .consumer
            .commit_consumer_state(rdkafka::consumer::CommitMode::Sync)
        {
            Ok(()) => Ok(()),
            Err(err) if err.rdkafka_error_code() == Some(rdkafka::error::RDKafkaErrorCode::NoOffset) => {
                Ok(())
            }
            Err(err) => Err(DispatchError::Poll(err.to_string())),
        }
    }
}
