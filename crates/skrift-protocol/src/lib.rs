//! Kafka wire protocol codec for Skrift.
//!
//! This crate provides:
//! - Primitive readers and writers over a byte buffer (varints, compact
//!   strings and arrays, UUIDs, tagged-field buffers)
//! - Request/response framing with 4-byte length prefixes
//! - Record batch format v2 with CRC-32C validation
//! - Request and response codecs for ApiVersions, DescribeTopicPartitions,
//!   Fetch, Produce and CreateTopics
//! - Builders producing well-formed default requests for driving the codec

pub mod api_versions_types;
pub mod builders;
pub mod create_topics_types;
pub mod describe_topic_partitions_types;
pub mod error_codes;
pub mod fetch_types;
pub mod frame;
pub mod headers;
pub mod parser;
pub mod produce_types;
pub mod records;
pub mod types;

// Re-export main types
pub use frame::{pack_message, Frame, KafkaFrameCodec};
pub use headers::{ApiKey, RequestHeader, ResponseHeader};
pub use parser::{Decoder, Encoder, KafkaDecodable, KafkaEncodable};
pub use records::{decode_batch_sequence, Record, RecordBatch, RecordHeader};
pub use types::{decode_request, decode_response, Request, RequestBody, ResponseBody};
