use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForwarderError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("envelope encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invocation error for function {function}: {source}")]
    Invoke {
        function: String,
        source: anyhow::Error,
    },
}
