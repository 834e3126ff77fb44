use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use tracing::{error, info};

use crate::error::ForwarderError;
use crate::invoker::FunctionInvoker;
use crate::types::{ConsumerRecord, RecordBatch};

/// Flattened copy of one record, the unit of the forwarded payload. Key and
/// value travel as UTF-8 text, header values as base64, so the payload stays
/// plain JSON for the receiving function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: i64,
    #[serde(rename = "timestampType")]
    pub timestamp_type: &'static str,
    pub key: Option<String>,
    pub value: Option<String>,
    pub headers: Vec<EnvelopeHeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeHeader {
    pub key: String,
    pub value: Option<String>,
}

impl Envelope {
    pub fn from_record(record: &ConsumerRecord) -> Self {
        Self {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
            timestamp: record.timestamp,
            timestamp_type: record.timestamp_type,
            key: record
                .key
                .as_deref()
                .map(|k| String::from_utf8_lossy(k).into_owned()),
            value: record
                .value
                .as_deref()
                .map(|v| String::from_utf8_lossy(v).into_owned()),
            headers: record
                .headers
                .iter()
                .map(|header| EnvelopeHeader {
                    key: header.key.clone(),
                    value: header
                        .value
                        .as_deref()
                        .map(|v| general_purpose::STANDARD.encode(v)),
                })
                .collect(),
        }
    }
}

/// Encodes an envelope list into the single invocation payload.
pub trait PayloadCodec: Send + Sync {
    fn encode(&self, envelopes: &[Envelope]) -> Result<Vec<u8>, ForwarderError>;
}

/// Production codec: one JSON array per batch.
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode(&self, envelopes: &[Envelope]) -> Result<Vec<u8>, ForwarderError> {
        Ok(serde_json::to_vec(envelopes)?)
    }
}

/// Converts each polled batch into envelopes and fires one asynchronous
/// function invocation per batch. Nothing here feeds back into the consume
/// loop: encoding failures drop the batch from forwarding, and invocation
/// completion is only ever logged.
pub struct Forwarder {
    codec: Box<dyn PayloadCodec>,
    invoker: Arc<dyn FunctionInvoker>,
}

impl Forwarder {
    pub fn new(invoker: Arc<dyn FunctionInvoker>) -> Self {
        Self::with_codec(Box::new(JsonCodec), invoker)
    }

    pub fn with_codec(codec: Box<dyn PayloadCodec>, invoker: Arc<dyn FunctionInvoker>) -> Self {
        Self { codec, invoker }
    }

    /// Hands one batch to the downstream function. Returns once the
    /// invocation task is submitted; several invocations may be in flight at
    /// once if completions are slow.
    pub fn dispatch(&self, batch: &RecordBatch) {
        let envelopes: Vec<Envelope> = batch.records().iter().map(Envelope::from_record).collect();

        let payload = match self.codec.encode(&envelopes) {
            Ok(payload) => payload,
            Err(e) => {
                metrics::counter!("forwarder_encode_failures").increment(1);
                error!(
                    error = %e,
                    records = envelopes.len(),
                    "Failed to encode envelope batch, dropping it"
                );
                return;
            }
        };

        metrics::counter!("forwarder_batches_submitted").increment(1);
        metrics::counter!("forwarder_envelopes_submitted").increment(envelopes.len() as u64);

        let invoker = self.invoker.clone();
        tokio::spawn(async move {
            match invoker.invoke(payload).await {
                Ok(response) => {
                    metrics::counter!("forwarder_invocations_completed").increment(1);
                    info!(
                        payload = response.payload.as_deref().unwrap_or(""),
                        "Function invocation complete"
                    );
                }
                Err(e) => {
                    metrics::counter!("forwarder_invocation_failures").increment(1);
                    error!(error = %e, "Function invocation failed");
                }
            }
        });
    }
}
