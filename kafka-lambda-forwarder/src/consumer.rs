use async_trait::async_trait;
use futures::FutureExt;
use rdkafka::consumer::{CommitMode, Consumer};
use rdkafka::error::{KafkaError, KafkaResult};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::context::ForwarderConsumer;
use crate::error::ForwarderError;
use crate::forwarder::Forwarder;
use crate::types::{ConsumerRecord, RecordBatch};

/// The session operations the loop drives. The production implementation is
/// the stream consumer; tests substitute a scripted fake.
#[async_trait]
pub trait ConsumerSession: Send + Sync {
    /// Waits until the next record is available. No application-level
    /// timeout; only closing the session interrupts the wait.
    async fn next_record(&self) -> Result<ConsumerRecord, KafkaError>;

    /// Returns a record only if the client already has one buffered, without
    /// waiting for more.
    async fn buffered_record(&self) -> Option<Result<ConsumerRecord, KafkaError>>;

    fn store_offset(&self, record: &ConsumerRecord) -> KafkaResult<()>;

    fn commit_async(&self) -> KafkaResult<()>;
}

#[async_trait]
impl ConsumerSession for ForwarderConsumer {
    async fn next_record(&self) -> Result<ConsumerRecord, KafkaError> {
        let message = self.recv().await?;
        Ok(ConsumerRecord::from_kafka_message(&message))
    }

    async fn buffered_record(&self) -> Option<Result<ConsumerRecord, KafkaError>> {
        // recv resolves on the first poll when librdkafka already holds a
        // fetched message, so a single poll distinguishes buffered from not.
        match self.recv().now_or_never() {
            Some(Ok(message)) => Some(Ok(ConsumerRecord::from_kafka_message(&message))),
            Some(Err(e)) => Some(Err(e)),
            None => None,
        }
    }

    fn store_offset(&self, record: &ConsumerRecord) -> KafkaResult<()> {
        Consumer::store_offset(self, &record.topic, record.partition, record.offset)
    }

    fn commit_async(&self) -> KafkaResult<()> {
        self.commit_consumer_state(CommitMode::Async)
    }
}

/// Drives the consume → forward → commit cycle until shutdown is signaled or
/// a poll fails. Dropping the loop drops the session, which closes the
/// consumer and releases group membership, so partitions rebalance away on
/// every exit path.
pub struct ConsumerLoop<S> {
    session: S,
    forwarder: Forwarder,
    max_poll_records: usize,
}

impl<S: ConsumerSession> ConsumerLoop<S> {
    pub fn new(session: S, forwarder: Forwarder, max_poll_records: usize) -> Self {
        Self {
            session,
            forwarder,
            max_poll_records,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<()>) -> Result<(), ForwarderError> {
        loop {
            let batch = tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown signaled, closing consumer session");
                    return Ok(());
                }
                polled = self.poll() => polled?,
            };

            metrics::counter!("consumer_batches_polled").increment(1);
            metrics::counter!("consumer_records_polled").increment(batch.len() as u64);
            debug!(records = batch.len(), "Dispatching polled batch");

            // Dispatch never fails the loop; the forwarder handles its own
            // errors. The commit that follows does not depend on it.
            self.forwarder.dispatch(&batch);
            self.commit(&batch);
        }
    }

    /// Waits for one record, then drains whatever the client has already
    /// buffered, up to the per-poll cap, without further waiting.
    async fn poll(&self) -> Result<RecordBatch, ForwarderError> {
        let first = self.session.next_record().await?;
        let mut batch = RecordBatch::with_capacity(self.max_poll_records);
        batch.push(first);

        while batch.len() < self.max_poll_records {
            match self.session.buffered_record().await {
                Some(Ok(record)) => batch.push(record),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }

        Ok(batch)
    }

    /// Stores every polled offset and requests one asynchronous commit.
    /// Nothing waits on the outcome; failures are logged and never escalate.
    fn commit(&self, batch: &RecordBatch) {
        for record in batch.records() {
            if let Err(e) = self.session.store_offset(record) {
                warn!(
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Failed to store offset"
                );
            }
        }

        match self.session.commit_async() {
            Ok(()) => {
                metrics::counter!("consumer_commits_requested").increment(1);
            }
            Err(e) => {
                warn!(error = %e, "Failed to request offset commit");
            }
        }
    }
}
