use rdkafka::consumer::{BaseConsumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::{ClientContext, TopicPartitionList};
use tracing::{debug, info, warn};

use crate::rebalance::RebalanceSeeker;

/// Client context for the forwarding consumer. Logs group membership changes,
/// lets the seeker position cursors once partitions are actually assigned,
/// and logs the outcome of asynchronous commits without acting on it.
pub struct ForwarderContext {
    seeker: Option<RebalanceSeeker>,
}

impl ForwarderContext {
    pub fn new(seeker: Option<RebalanceSeeker>) -> Self {
        Self { seeker }
    }
}

impl ClientContext for ForwarderContext {}

impl ConsumerContext for ForwarderContext {
    fn pre_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Assign(partitions) => {
                info!("Assigning {} partitions", partitions.count());
            }
            Rebalance::Revoke(partitions) => {
                info!("Revoking {} partitions", partitions.count());
            }
            Rebalance::Error(e) => {
                warn!("Rebalance error: {}", e);
            }
        }
    }

    fn post_rebalance(&self, base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Assign(partitions) => {
                if let Some(seeker) = &self.seeker {
                    seeker.on_partitions_assigned(base_consumer, partitions);
                }
            }
            // Position durability relies on whatever commit already
            // succeeded before revocation.
            Rebalance::Revoke(_) | Rebalance::Error(_) => {}
        }
    }

    fn commit_callback(
        &self,
        result: rdkafka::error::KafkaResult<()>,
        offsets: &TopicPartitionList,
    ) {
        match result {
            Ok(()) => {
                debug!("Committed offsets for {} partitions", offsets.count());
            }
            Err(e) => {
                warn!("Failed to commit offsets: {}", e);
            }
        }
    }
}

/// Stream consumer carrying the forwarding context.
pub type ForwarderConsumer = StreamConsumer<ForwarderContext>;
