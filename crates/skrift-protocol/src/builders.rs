//! Constructors for well-formed requests and responses.
//!
//! These fill in the defaults the rest of the test suite relies on:
//! client id `"kafka-tester"`, zero throttle, acks = 1, producer id and
//! epoch = 0. They are conveniences over the plain structs, not part of
//! the wire protocol.

use bytes::Bytes;
use skrift_common::Uuid;

use crate::api_versions_types::{ApiVersionRange, ApiVersionsRequest, ApiVersionsResponse};
use crate::create_topics_types::{CreatableTopic, CreateTopicsRequest};
use crate::describe_topic_partitions_types::{DescribeTopicPartitionsRequest, TopicRequest};
use crate::error_codes;
use crate::fetch_types::{FetchPartition, FetchRequest, FetchTopic};
use crate::headers::{ApiKey, RequestHeader};
use crate::produce_types::{ProducePartitionData, ProduceRequest, ProduceTopicData};
use crate::records::{Record, RecordBatch, MAGIC_V2};
use crate::types::{Request, RequestBody};

/// Default client id stamped into request headers.
pub const DEFAULT_CLIENT_ID: &str = "kafka-tester";

fn header(api_key: ApiKey, api_version: i16, correlation_id: i32) -> RequestHeader {
    RequestHeader {
        api_key,
        api_version,
        correlation_id,
        client_id: Some(DEFAULT_CLIENT_ID.to_string()),
    }
}

/// ApiVersions v4 request advertising this client.
pub fn api_versions_request(correlation_id: i32) -> Request {
    Request {
        header: header(ApiKey::ApiVersions, 4, correlation_id),
        body: RequestBody::ApiVersions(ApiVersionsRequest {
            client_software_name: DEFAULT_CLIENT_ID.to_string(),
            client_software_version: "1".to_string(),
        }),
    }
}

/// ApiVersions response advertising the APIs this core speaks.
pub fn api_versions_response() -> ApiVersionsResponse {
    ApiVersionsResponse {
        error_code: error_codes::NONE,
        api_keys: vec![
            ApiVersionRange {
                api_key: ApiKey::Produce as i16,
                min_version: 0,
                max_version: 11,
            },
            ApiVersionRange {
                api_key: ApiKey::Fetch as i16,
                min_version: 0,
                max_version: 16,
            },
            ApiVersionRange {
                api_key: ApiKey::ApiVersions as i16,
                min_version: 0,
                max_version: 4,
            },
            ApiVersionRange {
                api_key: ApiKey::CreateTopics as i16,
                min_version: 0,
                max_version: 6,
            },
            ApiVersionRange {
                api_key: ApiKey::DescribeTopicPartitions as i16,
                min_version: 0,
                max_version: 0,
            },
        ],
        throttle_time_ms: 0,
    }
}

/// Fetch v16 request for a single topic partition starting at
/// `fetch_offset`.
pub fn fetch_request(correlation_id: i32, topic_id: Uuid, fetch_offset: i64) -> Request {
    Request {
        header: header(ApiKey::Fetch, 16, correlation_id),
        body: RequestBody::Fetch(FetchRequest {
            max_wait_ms: 500,
            min_bytes: 1,
            max_bytes: 52428800,
            isolation_level: 0,
            session_id: 0,
            session_epoch: 0,
            topics: vec![FetchTopic {
                topic_id,
                partitions: vec![FetchPartition {
                    partition: 0,
                    current_leader_epoch: 0,
                    fetch_offset,
                    last_fetched_offset: -1,
                    log_start_offset: -1,
                    partition_max_bytes: 1048576,
                }],
            }],
            forgotten_topics: vec![],
            rack_id: String::new(),
        }),
    }
}

/// Produce v11 request writing `batches` to partition 0 of `topic`.
pub fn produce_request(correlation_id: i32, topic: &str, batches: Vec<RecordBatch>) -> Request {
    Request {
        header: header(ApiKey::Produce, 11, correlation_id),
        body: RequestBody::Produce(ProduceRequest {
            transactional_id: None,
            acks: 1,
            timeout_ms: 1500,
            topics: vec![ProduceTopicData {
                name: topic.to_string(),
                partitions: vec![ProducePartitionData {
                    index: 0,
                    record_batches: batches,
                }],
            }],
        }),
    }
}

/// CreateTopics v6 request for a single topic with broker-side defaults.
pub fn create_topics_request(correlation_id: i32, topic: &str) -> Request {
    Request {
        header: header(ApiKey::CreateTopics, 6, correlation_id),
        body: RequestBody::CreateTopics(CreateTopicsRequest {
            topics: vec![CreatableTopic {
                name: topic.to_string(),
                num_partitions: -1,
                replication_factor: -1,
                assignments: vec![],
                configs: vec![],
            }],
            timeout_ms: 5000,
            validate_only: false,
        }),
    }
}

/// DescribeTopicPartitions v0 request for the named topics.
pub fn describe_topic_partitions_request(correlation_id: i32, topics: &[&str]) -> Request {
    Request {
        header: header(ApiKey::DescribeTopicPartitions, 0, correlation_id),
        body: RequestBody::DescribeTopicPartitions(DescribeTopicPartitionsRequest {
            topics: topics
                .iter()
                .map(|name| TopicRequest {
                    name: (*name).to_string(),
                })
                .collect(),
            response_partition_limit: 100,
            cursor: None,
        }),
    }
}

/// A batch at `base_offset` holding the given values, one record per
/// value with `offset_delta` assigned sequentially.
pub fn record_batch(base_offset: i64, values: &[&[u8]]) -> RecordBatch {
    let records: Vec<Record> = values
        .iter()
        .enumerate()
        .map(|(i, value)| Record {
            attributes: 0,
            timestamp_delta: 0,
            offset_delta: i as i32,
            key: None,
            value: Some(Bytes::copy_from_slice(value)),
            headers: vec![],
        })
        .collect();

    RecordBatch {
        base_offset,
        batch_length: 0,
        partition_leader_epoch: 0,
        magic: MAGIC_V2,
        crc: 0,
        attributes: 0,
        last_offset_delta: records.len().saturating_sub(1) as i32,
        first_timestamp: 0,
        max_timestamp: 0,
        producer_id: 0,
        producer_epoch: 0,
        base_sequence: 0,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Decoder;
    use crate::types::decode_request;

    #[test]
    fn test_builders_produce_decodable_requests() {
        let requests = [
            api_versions_request(1),
            fetch_request(2, Uuid::from_bytes([9; 16]), 0),
            produce_request(3, "orders", vec![record_batch(0, &[b"a"])]),
            create_topics_request(4, "orders"),
            describe_topic_partitions_request(5, &["orders", "payments"]),
        ];

        for request in requests {
            let framed = request.encode();
            let decoded = decode_request(&framed[4..]).unwrap();
            assert_eq!(decoded.header, request.header);
            assert_eq!(decoded.header.client_id.as_deref(), Some(DEFAULT_CLIENT_ID));
        }
    }

    #[test]
    fn test_record_batch_builder_assigns_offset_deltas() {
        let batch = record_batch(5, &[b"a", b"b", b"c"]);
        assert_eq!(batch.base_offset, 5);
        assert_eq!(batch.last_offset_delta, 2);
        let deltas: Vec<i32> = batch.records.iter().map(|r| r.offset_delta).collect();
        assert_eq!(deltas, vec![0, 1, 2]);

        let encoded = batch.to_bytes();
        let decoded = RecordBatch::decode(&mut Decoder::new(&encoded)).unwrap();
        assert_eq!(decoded.records.len(), 3);
    }
}
