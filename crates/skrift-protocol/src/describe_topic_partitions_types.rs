//! DescribeTopicPartitions API types (v0).

use serde::{Deserialize, Serialize};
use skrift_common::{DecodeError, DecodeErrorKind, DecodeResult, ErrorContext, Uuid};

use crate::headers::ResponseHeader;
use crate::parser::{Decoder, Encoder, KafkaDecodable, KafkaEncodable};

/// Pagination cursor. Null on the wire is a single leading byte of -1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub topic_name: String,
    pub partition_index: i32,
}

impl Cursor {
    fn encode_nullable(cursor: Option<&Cursor>, encoder: &mut Encoder<'_>) {
        match cursor {
            None => encoder.write_i8(-1),
            Some(c) => {
                encoder.write_compact_string(&c.topic_name);
                encoder.write_i32(c.partition_index);
                encoder.write_empty_tag_buffer();
            }
        }
    }

    fn decode_nullable(decoder: &mut Decoder<'_>) -> DecodeResult<Option<Cursor>> {
        // The null marker doubles as the first byte of the compact string
        // length, so peek before committing to either reading.
        let marker = decoder.peek_raw_bytes(1)?[0] as i8;
        if marker == -1 {
            decoder.read_i8()?;
            return Ok(None);
        }

        let topic_name = decoder.read_compact_string().context("topic_name")?;
        let partition_index = decoder.read_i32().context("partition_index")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(Some(Cursor {
            topic_name,
            partition_index,
        }))
    }
}

/// Topic selector in the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRequest {
    pub name: String,
}

/// DescribeTopicPartitions request body (v0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeTopicPartitionsRequest {
    pub topics: Vec<TopicRequest>,
    pub response_partition_limit: i32,
    pub cursor: Option<Cursor>,
}

impl KafkaEncodable for DescribeTopicPartitionsRequest {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_compact_array_length(self.topics.len());
        for topic in &self.topics {
            encoder.write_compact_string(&topic.name);
            encoder.write_empty_tag_buffer();
        }
        encoder.write_i32(self.response_partition_limit);
        Cursor::encode_nullable(self.cursor.as_ref(), encoder);
        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for DescribeTopicPartitionsRequest {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let count = decoder.read_compact_array_length().context("topics")?;
        let mut topics = Vec::with_capacity(count);
        for i in 0..count {
            let name = decoder
                .read_compact_string()
                .context("name")
                .context(format!("Topics[{}]", i))?;
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(format!("Topics[{}]", i))?;
            topics.push(TopicRequest { name });
        }

        let response_partition_limit = decoder
            .read_i32()
            .context("response_partition_limit")?;
        let cursor = Cursor::decode_nullable(decoder).context("cursor")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(DescribeTopicPartitionsRequest {
            topics,
            response_partition_limit,
            cursor,
        })
    }
}

/// Per-partition metadata in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMetadata {
    pub error_code: i16,
    pub partition_index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
    pub eligible_leader_replicas: Vec<i32>,
    pub last_known_elr: Vec<i32>,
    pub offline_replicas: Vec<i32>,
}

impl PartitionMetadata {
    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i16(self.error_code);
        encoder.write_i32(self.partition_index);
        encoder.write_i32(self.leader_id);
        encoder.write_i32(self.leader_epoch);
        encoder.write_compact_int32_array(&self.replica_nodes);
        encoder.write_compact_int32_array(&self.isr_nodes);
        encoder.write_compact_int32_array(&self.eligible_leader_replicas);
        encoder.write_compact_int32_array(&self.last_known_elr);
        encoder.write_compact_int32_array(&self.offline_replicas);
        encoder.write_empty_tag_buffer();
    }

    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let error_code = decoder.read_i16().context("error_code")?;
        let partition_index = decoder.read_i32().context("partition_index")?;
        let leader_id = decoder.read_i32().context("leader_id")?;
        let leader_epoch = decoder.read_i32().context("leader_epoch")?;
        let replica_nodes = decoder.read_compact_int32_array().context("replica_nodes")?;
        let isr_nodes = decoder.read_compact_int32_array().context("isr_nodes")?;
        let eligible_leader_replicas = decoder
            .read_compact_int32_array()
            .context("eligible_leader_replicas")?;
        let last_known_elr = decoder
            .read_compact_int32_array()
            .context("last_known_elr")?;
        let offline_replicas = decoder
            .read_compact_int32_array()
            .context("offline_replicas")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(PartitionMetadata {
            error_code,
            partition_index,
            leader_id,
            leader_epoch,
            replica_nodes,
            isr_nodes,
            eligible_leader_replicas,
            last_known_elr,
            offline_replicas,
        })
    }
}

/// Per-topic metadata in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMetadata {
    pub error_code: i16,
    pub name: Option<String>,
    pub topic_id: Uuid,
    pub is_internal: bool,
    pub partitions: Vec<PartitionMetadata>,
    pub topic_authorized_operations: i32,
}

impl TopicMetadata {
    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i16(self.error_code);
        encoder.write_compact_nullable_string(self.name.as_deref());
        encoder.write_uuid(self.topic_id);
        encoder.write_bool(self.is_internal);
        encoder.write_compact_array_length(self.partitions.len());
        for partition in &self.partitions {
            partition.encode(encoder);
        }
        encoder.write_i32(self.topic_authorized_operations);
        encoder.write_empty_tag_buffer();
    }

    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let error_code = decoder.read_i16().context("error_code")?;
        let name = decoder.read_compact_nullable_string().context("name")?;
        let topic_id = decoder.read_uuid().context("topic_id")?;
        let is_internal = decoder.read_bool().context("is_internal")?;

        let count = decoder.read_compact_array_length().context("partitions")?;
        let mut partitions = Vec::with_capacity(count);
        for i in 0..count {
            partitions
                .push(PartitionMetadata::decode(decoder).context(format!("Partitions[{}]", i))?);
        }

        let topic_authorized_operations = decoder
            .read_i32()
            .context("topic_authorized_operations")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(TopicMetadata {
            error_code,
            name,
            topic_id,
            is_internal,
            partitions,
            topic_authorized_operations,
        })
    }
}

/// DescribeTopicPartitions response body (v0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeTopicPartitionsResponse {
    pub throttle_time_ms: i32,
    pub topics: Vec<TopicMetadata>,
    pub next_cursor: Option<Cursor>,
}

impl KafkaEncodable for DescribeTopicPartitionsResponse {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_i32(self.throttle_time_ms);
        encoder.write_compact_array_length(self.topics.len());
        for topic in &self.topics {
            topic.encode(encoder);
        }
        Cursor::encode_nullable(self.next_cursor.as_ref(), encoder);
        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for DescribeTopicPartitionsResponse {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let throttle_time_ms = decoder.read_i32().context("throttle_time_ms")?;

        let count = decoder.read_compact_array_length().context("topics")?;
        let mut topics = Vec::with_capacity(count);
        for i in 0..count {
            topics.push(TopicMetadata::decode(decoder).context(format!("Topics[{}]", i))?);
        }

        let next_cursor = Cursor::decode_nullable(decoder).context("next_cursor")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(DescribeTopicPartitionsResponse {
            throttle_time_ms,
            topics,
            next_cursor,
        })
    }
}

/// Decode a full unframed DescribeTopicPartitions response: header v1,
/// body, and a zero-remainder check.
pub fn decode_describe_topic_partitions_response(
    bytes: &[u8],
    version: i16,
) -> DecodeResult<(ResponseHeader, DescribeTopicPartitionsResponse)> {
    let mut decoder = Decoder::new(bytes);
    let result = (|| {
        let header = ResponseHeader::decode_v1(&mut decoder)?;
        let body = DescribeTopicPartitionsResponse::decode(&mut decoder, version)?;
        if decoder.remaining() > 0 {
            return Err(DecodeError::new(
                DecodeErrorKind::TrailingBytes(decoder.remaining()),
                decoder.position(),
            ));
        }
        Ok((header, body))
    })();

    result.context(format!("DescribeTopicPartitions Response v{}", version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn sample_topic() -> TopicMetadata {
        TopicMetadata {
            error_code: 0,
            name: Some("orders".to_string()),
            topic_id: Uuid::from_bytes([0xab; 16]),
            is_internal: false,
            partitions: vec![PartitionMetadata {
                error_code: 0,
                partition_index: 0,
                leader_id: 1,
                leader_epoch: 0,
                replica_nodes: vec![1, 2, 3],
                isr_nodes: vec![1, 2],
                eligible_leader_replicas: vec![],
                last_known_elr: vec![],
                offline_replicas: vec![3],
            }],
            topic_authorized_operations: 0x0df8,
        }
    }

    #[test]
    fn test_request_round_trip_null_cursor() {
        let request = DescribeTopicPartitionsRequest {
            topics: vec![TopicRequest {
                name: "orders".to_string(),
            }],
            response_partition_limit: 100,
            cursor: None,
        };

        let mut buf = BytesMut::new();
        request.encode(&mut Encoder::new(&mut buf), 0);

        let mut decoder = Decoder::new(&buf);
        let decoded = DescribeTopicPartitionsRequest::decode(&mut decoder, 0).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn test_request_round_trip_with_cursor() {
        let request = DescribeTopicPartitionsRequest {
            topics: vec![TopicRequest {
                name: "orders".to_string(),
            }],
            response_partition_limit: 1,
            cursor: Some(Cursor {
                topic_name: "orders".to_string(),
                partition_index: 2,
            }),
        };

        let mut buf = BytesMut::new();
        request.encode(&mut Encoder::new(&mut buf), 0);

        let decoded = DescribeTopicPartitionsRequest::decode(&mut Decoder::new(&buf), 0).unwrap();
        assert_eq!(decoded.cursor, request.cursor);
    }

    #[test]
    fn test_null_cursor_is_one_byte() {
        let mut buf = BytesMut::new();
        Cursor::encode_nullable(None, &mut Encoder::new(&mut buf));
        assert_eq!(&buf[..], &[0xff]);
    }

    #[test]
    fn test_response_round_trip() {
        let response = DescribeTopicPartitionsResponse {
            throttle_time_ms: 0,
            topics: vec![sample_topic()],
            next_cursor: None,
        };

        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        ResponseHeader::new(11).encode_v1(&mut encoder);
        response.encode(&mut encoder, 0);

        let (header, decoded) = decode_describe_topic_partitions_response(&buf, 0).unwrap();
        assert_eq!(header.correlation_id, 11);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_error_inside_partition_carries_breadcrumbs() {
        let response = DescribeTopicPartitionsResponse {
            throttle_time_ms: 0,
            topics: vec![sample_topic()],
            next_cursor: None,
        };

        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        ResponseHeader::new(11).encode_v1(&mut encoder);
        response.encode(&mut encoder, 0);

        // Corrupt the is_internal boolean (header 5 bytes + throttle 4 +
        // array len 1 + error_code 2 + name 7 + uuid 16).
        let mut bytes = buf.to_vec();
        bytes[35] = 2;

        let err = decode_describe_topic_partitions_response(&bytes, 0).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidBool);
        assert_eq!(
            err.context,
            vec![
                "is_internal",
                "Topics[0]",
                "DescribeTopicPartitions Response v0"
            ]
        );
        assert_eq!(err.offset, 35);
    }
}
