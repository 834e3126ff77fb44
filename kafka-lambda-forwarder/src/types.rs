use rdkafka::message::{Headers, Message};
use rdkafka::Timestamp;

/// A single record header. Kafka allows header values to be null, so the
/// value stays optional all the way through to the forwarded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// Owned copy of one consumed record, detached from the client's borrow so it
/// can outlive the poll that produced it.
#[derive(Debug, Clone)]
pub struct ConsumerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Broker timestamp in epoch milliseconds, -1 when the broker reports none.
    pub timestamp: i64,
    pub timestamp_type: &'static str,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<RecordHeader>,
}

impl ConsumerRecord {
    pub fn from_kafka_message(msg: &impl Message) -> Self {
        let headers = msg
            .headers()
            .map(|hdrs| {
                hdrs.iter()
                    .map(|header| RecordHeader {
                        key: header.key.to_string(),
                        value: header.value.map(|v| v.to_vec()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            timestamp: msg.timestamp().to_millis().unwrap_or(-1),
            timestamp_type: timestamp_type_name(msg.timestamp()),
            key: msg.key().map(|k| k.to_vec()),
            value: msg.payload().map(|v| v.to_vec()),
            headers,
        }
    }
}

pub fn timestamp_type_name(timestamp: Timestamp) -> &'static str {
    match timestamp {
        Timestamp::NotAvailable => "NoTimestampType",
        Timestamp::CreateTime(_) => "CreateTime",
        Timestamp::LogAppendTime(_) => "LogAppendTime",
    }
}

/// Ordered set of records returned by one poll cycle. Order is client-side
/// iteration order; records from different partitions may interleave.
#[derive(Debug, Default)]
pub struct RecordBatch {
    records: Vec<ConsumerRecord>,
}

impl RecordBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: ConsumerRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ConsumerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::message::{Header, OwnedHeaders, OwnedMessage};

    fn create_test_message(headers: Option<OwnedHeaders>) -> OwnedMessage {
        OwnedMessage::new(
            Some(b"payload-bytes".to_vec()),
            Some(b"record-key".to_vec()),
            "demo".to_string(),
            Timestamp::CreateTime(1700000000123),
            1,
            42,
            headers,
        )
    }

    #[test]
    fn record_copies_every_field_from_the_message() {
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "trace-id",
                value: Some(b"abc123"),
            })
            .insert(Header {
                key: "empty",
                value: None::<&[u8]>,
            });
        let record = ConsumerRecord::from_kafka_message(&create_test_message(Some(headers)));

        assert_eq!(record.topic, "demo");
        assert_eq!(record.partition, 1);
        assert_eq!(record.offset, 42);
        assert_eq!(record.timestamp, 1700000000123);
        assert_eq!(record.timestamp_type, "CreateTime");
        assert_eq!(record.key.as_deref(), Some(b"record-key".as_slice()));
        assert_eq!(record.value.as_deref(), Some(b"payload-bytes".as_slice()));
        assert_eq!(record.headers.len(), 2);
        assert_eq!(record.headers[0].key, "trace-id");
        assert_eq!(record.headers[0].value.as_deref(), Some(b"abc123".as_slice()));
        assert_eq!(record.headers[1].key, "empty");
        assert_eq!(record.headers[1].value, None);
    }

    #[test]
    fn missing_timestamp_maps_to_minus_one() {
        let msg = OwnedMessage::new(
            None,
            None,
            "demo".to_string(),
            Timestamp::NotAvailable,
            0,
            7,
            None,
        );
        let record = ConsumerRecord::from_kafka_message(&msg);

        assert_eq!(record.timestamp, -1);
        assert_eq!(record.timestamp_type, "NoTimestampType");
        assert_eq!(record.key, None);
        assert_eq!(record.value, None);
        assert!(record.headers.is_empty());
    }

    #[test]
    fn timestamp_type_names() {
        assert_eq!(timestamp_type_name(Timestamp::NotAvailable), "NoTimestampType");
        assert_eq!(timestamp_type_name(Timestamp::CreateTime(1)), "CreateTime");
        assert_eq!(
            timestamp_type_name(Timestamp::LogAppendTime(1)),
            "LogAppendTime"
        );
    }

    #[test]
    fn batch_preserves_push_order() {
        let mut batch = RecordBatch::with_capacity(2);
        for offset in [10, 11, 12] {
            let mut record = ConsumerRecord::from_kafka_message(&create_test_message(None));
            record.offset = offset;
            batch.push(record);
        }

        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        let offsets: Vec<i64> = batch.records().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![10, 11, 12]);
    }
}
