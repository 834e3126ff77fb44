//! End-to-end flow over the public seams: a scripted consumer session feeds
//! the loop, a channel-backed invoker stands in for Lambda, and the tests
//! check the batch → envelope → invocation → commit properties.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rdkafka::error::{KafkaError, KafkaResult};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use kafka_lambda_forwarder::consumer::{ConsumerLoop, ConsumerSession};
use kafka_lambda_forwarder::error::ForwarderError;
use kafka_lambda_forwarder::forwarder::Forwarder;
use kafka_lambda_forwarder::invoker::{FunctionInvoker, InvocationResponse};
use kafka_lambda_forwarder::types::{ConsumerRecord, RecordHeader};

struct ScriptedSession {
    records: Mutex<VecDeque<ConsumerRecord>>,
    commits: AtomicUsize,
}

impl ScriptedSession {
    fn new(records: Vec<ConsumerRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records.into()),
            commits: AtomicUsize::new(0),
        })
    }

    fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

/// Session handed to the loop. `ConsumerSession` is foreign to this crate,
/// so it is implemented on this local handle rather than on `Arc` directly.
#[derive(Clone)]
struct SessionHandle(Arc<ScriptedSession>);

#[async_trait]
impl ConsumerSession for SessionHandle {
    async fn next_record(&self) -> Result<ConsumerRecord, KafkaError> {
        let next = self.0.records.lock().unwrap().pop_front();
        match next {
            Some(record) => Ok(record),
            None => std::future::pending().await,
        }
    }

    async fn buffered_record(&self) -> Option<Result<ConsumerRecord, KafkaError>> {
        self.0.records.lock().unwrap().pop_front().map(Ok)
    }

    fn store_offset(&self, _record: &ConsumerRecord) -> KafkaResult<()> {
        Ok(())
    }

    fn commit_async(&self) -> KafkaResult<()> {
        self.0.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ChannelInvoker {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl FunctionInvoker for ChannelInvoker {
    async fn invoke(&self, payload: Vec<u8>) -> Result<InvocationResponse, ForwarderError> {
        self.tx.send(payload).unwrap();
        Ok(InvocationResponse {
            payload: Some("ok".to_string()),
        })
    }
}

struct PendingInvoker;

#[async_trait]
impl FunctionInvoker for PendingInvoker {
    async fn invoke(&self, _payload: Vec<u8>) -> Result<InvocationResponse, ForwarderError> {
        std::future::pending().await
    }
}

fn make_record(partition: i32, offset: i64, header_bytes: &[u8]) -> ConsumerRecord {
    ConsumerRecord {
        topic: "demo".to_string(),
        partition,
        offset,
        timestamp: 1700000000000 + offset,
        timestamp_type: "CreateTime",
        key: Some(format!("key-{partition}-{offset}").into_bytes()),
        value: Some(format!("value-{partition}-{offset}").into_bytes()),
        headers: vec![RecordHeader {
            key: "trace-id".to_string(),
            value: Some(header_bytes.to_vec()),
        }],
    }
}

async fn wait_for_commit(session: &ScriptedSession) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.commits() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("commit never arrived");
}

#[tokio::test]
async fn batch_spanning_partitions_yields_one_ordered_invocation_and_one_commit() {
    let records = vec![
        make_record(0, 100, &[0xde, 0xad]),
        make_record(1, 7, &[0xbe, 0xef]),
        make_record(0, 101, &[0x00]),
        make_record(1, 8, &[0xff, 0xfe, 0xfd]),
    ];
    let session = ScriptedSession::new(records);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let forwarder = Forwarder::new(Arc::new(ChannelInvoker { tx }));
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let consumer_loop = ConsumerLoop::new(SessionHandle(session.clone()), forwarder, 500);
    let handle = tokio::spawn(consumer_loop.run(shutdown_rx));

    let payload = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no invocation arrived")
        .unwrap();

    let envelopes: Value = serde_json::from_slice(&payload).unwrap();
    let envelopes = envelopes.as_array().unwrap();
    assert_eq!(envelopes.len(), 4);

    // Original batch order, across both partitions.
    let positions: Vec<(i64, i64)> = envelopes
        .iter()
        .map(|e| {
            (
                e["partition"].as_i64().unwrap(),
                e["offset"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(positions, vec![(0, 100), (1, 7), (0, 101), (1, 8)]);

    // Header bytes survive untouched through the base64 carrier.
    let expected_headers: Vec<Vec<u8>> = vec![
        vec![0xde, 0xad],
        vec![0xbe, 0xef],
        vec![0x00],
        vec![0xff, 0xfe, 0xfd],
    ];
    for (envelope, expected) in envelopes.iter().zip(expected_headers) {
        let headers = envelope["headers"].as_array().unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0]["key"], "trace-id");
        let decoded = general_purpose::STANDARD
            .decode(headers[0]["value"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, expected);
    }

    // One batch, one invocation, one commit.
    wait_for_commit(&session).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(session.commits(), 1);

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop did not shut down")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn commit_completes_while_invocation_never_resolves() {
    let session = ScriptedSession::new(vec![make_record(0, 1, b"x"), make_record(1, 1, b"y")]);
    let forwarder = Forwarder::new(Arc::new(PendingInvoker));
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let consumer_loop = ConsumerLoop::new(SessionHandle(session.clone()), forwarder, 500);
    let handle = tokio::spawn(consumer_loop.run(shutdown_rx));

    wait_for_commit(&session).await;
    assert_eq!(session.commits(), 1);

    // Shutdown proceeds with the invocation still in flight.
    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop did not shut down")
        .unwrap();
    assert!(result.is_ok());
}
