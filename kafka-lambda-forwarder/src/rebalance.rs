use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use rdkafka::consumer::{BaseConsumer, Consumer, ConsumerContext};
use rdkafka::error::KafkaResult;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{info, warn};

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Where to position a partition's cursor the first time it is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPosition {
    Beginning,
    End,
}

impl SeekPosition {
    /// Maps the configured position string. Empty means no seeking;
    /// unrecognized values also disable seeking, with a warning so typos are
    /// visible instead of silently accepted.
    pub fn parse(raw: &str) -> Option<SeekPosition> {
        match raw {
            "" => None,
            "start" => Some(SeekPosition::Beginning),
            "end" => Some(SeekPosition::End),
            other => {
                warn!(position = other, "Unrecognized seek position, seeking disabled");
                None
            }
        }
    }

    fn offset(self) -> Offset {
        match self {
            SeekPosition::Beginning => Offset::Beginning,
            SeekPosition::End => Offset::End,
        }
    }
}

/// The one consumer operation the seeker performs, split out so assignment
/// handling can run against a recording fake in tests.
pub trait PartitionSeek {
    fn seek_partition(&self, topic: &str, partition: i32, offset: Offset) -> KafkaResult<()>;
}

impl<C: ConsumerContext> PartitionSeek for BaseConsumer<C> {
    fn seek_partition(&self, topic: &str, partition: i32, offset: Offset) -> KafkaResult<()> {
        self.seek(topic, partition, offset, SEEK_TIMEOUT)
    }
}

/// Positions partition cursors when they are first assigned to this process.
/// Each partition is repositioned at most once per process lifetime, so a
/// partition that comes back after a rebalance keeps its forward progress
/// instead of being rewound.
pub struct RebalanceSeeker {
    position: SeekPosition,
    seen_partitions: Mutex<HashSet<i32>>,
}

impl RebalanceSeeker {
    pub fn new(position: SeekPosition) -> Self {
        Self {
            position,
            seen_partitions: Mutex::new(HashSet::new()),
        }
    }

    /// Runs inside the assignment callback, after the assignment has been
    /// applied. Partitions are marked seen before the seek is attempted, so a
    /// failed seek is not retried on a later assignment.
    pub fn on_partitions_assigned(
        &self,
        consumer: &impl PartitionSeek,
        assignment: &TopicPartitionList,
    ) {
        let mut seen = self.seen_partitions.lock().unwrap();
        for elem in assignment.elements() {
            if !seen.insert(elem.partition()) {
                continue;
            }

            match consumer.seek_partition(elem.topic(), elem.partition(), self.position.offset()) {
                Ok(()) => {
                    metrics::counter!("rebalance_partitions_seeked").increment(1);
                    info!(
                        topic = elem.topic(),
                        partition = elem.partition(),
                        position = ?self.position,
                        "Positioned newly assigned partition"
                    );
                }
                Err(e) => {
                    warn!(
                        topic = elem.topic(),
                        partition = elem.partition(),
                        error = %e,
                        "Failed to position newly assigned partition"
                    );
                }
            }
        }
    }
}
