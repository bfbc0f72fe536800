//! Produce API types (v11).
//!
//! Like Fetch, the per-partition record data travels as a compact-bytes
//! blob containing a concatenation of complete record batches.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use skrift_common::{DecodeError, DecodeErrorKind, DecodeResult, ErrorContext};

use crate::headers::ResponseHeader;
use crate::parser::{Decoder, Encoder, KafkaDecodable, KafkaEncodable};
use crate::records::{decode_batch_sequence, RecordBatch};

/// Data for one partition in a produce request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducePartitionData {
    pub index: i32,
    pub record_batches: Vec<RecordBatch>,
}

impl ProducePartitionData {
    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i32(self.index);

        let mut scratch = BytesMut::new();
        let mut blob = Encoder::new(&mut scratch);
        for batch in &self.record_batches {
            batch.encode(&mut blob);
        }
        encoder.write_compact_bytes(Some(&scratch[..]));

        encoder.write_empty_tag_buffer();
    }

    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let index = decoder.read_i32().context("index")?;

        let blob_len_offset = decoder.position();
        let blob_len = decoder.read_unsigned_varint().context("records")? as usize;
        let record_batches = if blob_len == 0 {
            Vec::new()
        } else {
            let blob_len = blob_len - 1;
            if blob_len > decoder.remaining() {
                return Err(DecodeError::new(
                    DecodeErrorKind::InvalidArrayLength,
                    blob_len_offset,
                )
                .context("records"));
            }
            let end = decoder.position() + blob_len;
            decode_batch_sequence(decoder, end).context("records")?
        };

        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(ProducePartitionData {
            index,
            record_batches,
        })
    }
}

/// Data for one topic in a produce request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceTopicData {
    pub name: String,
    pub partitions: Vec<ProducePartitionData>,
}

/// Produce request body (v11).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceRequest {
    pub transactional_id: Option<String>,
    /// -1 waits for all in-sync replicas, 0 for none, 1 for the leader.
    pub acks: i16,
    pub timeout_ms: i32,
    pub topics: Vec<ProduceTopicData>,
}

impl KafkaEncodable for ProduceRequest {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_compact_nullable_string(self.transactional_id.as_deref());
        encoder.write_i16(self.acks);
        encoder.write_i32(self.timeout_ms);

        encoder.write_compact_array_length(self.topics.len());
        for topic in &self.topics {
            encoder.write_compact_string(&topic.name);
            encoder.write_compact_array_length(topic.partitions.len());
            for partition in &topic.partitions {
                partition.encode(encoder);
            }
            encoder.write_empty_tag_buffer();
        }

        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for ProduceRequest {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let transactional_id = decoder
            .read_compact_nullable_string()
            .context("transactional_id")?;
        let acks = decoder.read_i16().context("acks")?;
        let timeout_ms = decoder.read_i32().context("timeout_ms")?;

        let topic_count = decoder.read_compact_array_length().context("topics")?;
        let mut topics = Vec::with_capacity(topic_count);
        for i in 0..topic_count {
            let context = format!("TopicData[{}]", i);
            let name = decoder
                .read_compact_string()
                .context("name")
                .context(&context)?;

            let partition_count = decoder
                .read_compact_array_length()
                .context("partitions")
                .context(&context)?;
            let mut partitions = Vec::with_capacity(partition_count);
            for j in 0..partition_count {
                partitions.push(
                    ProducePartitionData::decode(decoder)
                        .context(format!("PartitionData[{}]", j))
                        .context(&context)?,
                );
            }
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(&context)?;

            topics.push(ProduceTopicData { name, partitions });
        }

        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(ProduceRequest {
            transactional_id,
            acks,
            timeout_ms,
            topics,
        })
    }
}

/// Error attributed to a single batch inside a produce response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub batch_index: i32,
    pub batch_index_error_message: Option<String>,
}

/// Per-partition result in a produce response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducePartitionResponse {
    pub index: i32,
    pub error_code: i16,
    pub base_offset: i64,
    pub log_append_time_ms: i64,
    pub log_start_offset: i64,
    pub record_errors: Vec<RecordError>,
    pub error_message: Option<String>,
}

impl ProducePartitionResponse {
    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i32(self.index);
        encoder.write_i16(self.error_code);
        encoder.write_i64(self.base_offset);
        encoder.write_i64(self.log_append_time_ms);
        encoder.write_i64(self.log_start_offset);

        encoder.write_compact_array_length(self.record_errors.len());
        for record_error in &self.record_errors {
            encoder.write_i32(record_error.batch_index);
            encoder
                .write_compact_nullable_string(record_error.batch_index_error_message.as_deref());
            encoder.write_empty_tag_buffer();
        }

        encoder.write_compact_nullable_string(self.error_message.as_deref());
        encoder.write_empty_tag_buffer();
    }

    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let index = decoder.read_i32().context("index")?;
        let error_code = decoder.read_i16().context("error_code")?;
        let base_offset = decoder.read_i64().context("base_offset")?;
        let log_append_time_ms = decoder.read_i64().context("log_append_time_ms")?;
        let log_start_offset = decoder.read_i64().context("log_start_offset")?;

        let error_count = decoder
            .read_compact_array_length()
            .context("record_errors")?;
        let mut record_errors = Vec::with_capacity(error_count);
        for i in 0..error_count {
            let context = format!("RecordErrors[{}]", i);
            let batch_index = decoder
                .read_i32()
                .context("batch_index")
                .context(&context)?;
            let batch_index_error_message = decoder
                .read_compact_nullable_string()
                .context("batch_index_error_message")
                .context(&context)?;
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(&context)?;
            record_errors.push(RecordError {
                batch_index,
                batch_index_error_message,
            });
        }

        let error_message = decoder
            .read_compact_nullable_string()
            .context("error_message")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(ProducePartitionResponse {
            index,
            error_code,
            base_offset,
            log_append_time_ms,
            log_start_offset,
            record_errors,
            error_message,
        })
    }
}

/// Per-topic result in a produce response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceTopicResponse {
    pub name: String,
    pub partitions: Vec<ProducePartitionResponse>,
}

/// Produce response body (v11).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceResponse {
    pub responses: Vec<ProduceTopicResponse>,
    pub throttle_time_ms: i32,
}

impl KafkaEncodable for ProduceResponse {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_compact_array_length(self.responses.len());
        for topic in &self.responses {
            encoder.write_compact_string(&topic.name);
            encoder.write_compact_array_length(topic.partitions.len());
            for partition in &topic.partitions {
                partition.encode(encoder);
            }
            encoder.write_empty_tag_buffer();
        }
        encoder.write_i32(self.throttle_time_ms);
        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for ProduceResponse {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let topic_count = decoder.read_compact_array_length().context("responses")?;
        let mut responses = Vec::with_capacity(topic_count);
        for i in 0..topic_count {
            let context = format!("TopicResponse[{}]", i);
            let name = decoder
                .read_compact_string()
                .context("name")
                .context(&context)?;

            let partition_count = decoder
                .read_compact_array_length()
                .context("partitions")
                .context(&context)?;
            let mut partitions = Vec::with_capacity(partition_count);
            for j in 0..partition_count {
                partitions.push(
                    ProducePartitionResponse::decode(decoder)
                        .context(format!("PartitionResponse[{}]", j))
                        .context(&context)?,
                );
            }
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(&context)?;

            responses.push(ProduceTopicResponse { name, partitions });
        }

        let throttle_time_ms = decoder.read_i32().context("throttle_time_ms")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(ProduceResponse {
            responses,
            throttle_time_ms,
        })
    }
}

/// Decode a full unframed Produce response: header v1, body, and a
/// zero-remainder check.
pub fn decode_produce_response(
    bytes: &[u8],
    version: i16,
) -> DecodeResult<(ResponseHeader, ProduceResponse)> {
    let mut decoder = Decoder::new(bytes);
    let result = (|| {
        let header = ResponseHeader::decode_v1(&mut decoder)?;
        let body = ProduceResponse::decode(&mut decoder, version)?;
        if decoder.remaining() > 0 {
            return Err(DecodeError::new(
                DecodeErrorKind::TrailingBytes(decoder.remaining()),
                decoder.position(),
            ));
        }
        Ok((header, body))
    })();

    result.context(format!("Produce Response v{}", version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Record;
    use bytes::Bytes;

    fn one_record_batch(value: &'static [u8]) -> RecordBatch {
        RecordBatch {
            base_offset: 0,
            batch_length: 0,
            partition_leader_epoch: 0,
            magic: 2,
            crc: 0,
            attributes: 0,
            last_offset_delta: 0,
            first_timestamp: 0,
            max_timestamp: 0,
            producer_id: 0,
            producer_epoch: 0,
            base_sequence: 0,
            records: vec![Record {
                attributes: 0,
                timestamp_delta: 0,
                offset_delta: 0,
                key: None,
                value: Some(Bytes::from_static(value)),
                headers: vec![],
            }],
        }
    }

    #[test]
    fn test_request_round_trip() {
        let request = ProduceRequest {
            transactional_id: None,
            acks: 1,
            timeout_ms: 1500,
            topics: vec![ProduceTopicData {
                name: "orders".to_string(),
                partitions: vec![ProducePartitionData {
                    index: 0,
                    record_batches: vec![one_record_batch(b"payload")],
                }],
            }],
        };

        let mut buf = BytesMut::new();
        request.encode(&mut Encoder::new(&mut buf), 11);

        let mut decoder = Decoder::new(&buf);
        let decoded = ProduceRequest::decode(&mut decoder, 11).unwrap();
        assert_eq!(decoder.remaining(), 0);
        assert_eq!(decoded.acks, 1);
        assert_eq!(decoded.topics[0].name, "orders");
        assert_eq!(
            decoded.topics[0].partitions[0].record_batches[0].records[0].value,
            Some(Bytes::from_static(b"payload"))
        );

        // Round-trip at the byte level; crc/batch_length are recomputed.
        let mut reencoded = BytesMut::new();
        decoded.encode(&mut Encoder::new(&mut reencoded), 11);
        assert_eq!(&reencoded[..], &buf[..]);
    }

    #[test]
    fn test_empty_partition_data() {
        let request = ProduceRequest {
            transactional_id: Some("txn-1".to_string()),
            acks: -1,
            timeout_ms: 0,
            topics: vec![ProduceTopicData {
                name: "empty".to_string(),
                partitions: vec![ProducePartitionData {
                    index: 3,
                    record_batches: vec![],
                }],
            }],
        };

        let mut buf = BytesMut::new();
        request.encode(&mut Encoder::new(&mut buf), 11);

        let decoded = ProduceRequest::decode(&mut Decoder::new(&buf), 11).unwrap();
        assert_eq!(decoded.transactional_id.as_deref(), Some("txn-1"));
        assert!(decoded.topics[0].partitions[0].record_batches.is_empty());
    }

    #[test]
    fn test_response_round_trip() {
        let response = ProduceResponse {
            responses: vec![ProduceTopicResponse {
                name: "orders".to_string(),
                partitions: vec![ProducePartitionResponse {
                    index: 0,
                    error_code: 0,
                    base_offset: 42,
                    log_append_time_ms: -1,
                    log_start_offset: 0,
                    record_errors: vec![],
                    error_message: None,
                }],
            }],
            throttle_time_ms: 0,
        };

        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        ResponseHeader::new(9).encode_v1(&mut encoder);
        response.encode(&mut encoder, 11);

        let (header, decoded) = decode_produce_response(&buf, 11).unwrap();
        assert_eq!(header.correlation_id, 9);
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_response_with_record_errors() {
        let response = ProduceResponse {
            responses: vec![ProduceTopicResponse {
                name: "orders".to_string(),
                partitions: vec![ProducePartitionResponse {
                    index: 0,
                    error_code: 2,
                    base_offset: -1,
                    log_append_time_ms: -1,
                    log_start_offset: -1,
                    record_errors: vec![RecordError {
                        batch_index: 0,
                        batch_index_error_message: Some("corrupt batch".to_string()),
                    }],
                    error_message: Some("one or more batches rejected".to_string()),
                }],
            }],
            throttle_time_ms: 100,
        };

        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        ResponseHeader::new(1).encode_v1(&mut encoder);
        response.encode(&mut encoder, 11);

        let (_, decoded) = decode_produce_response(&buf, 11).unwrap();
        assert_eq!(decoded, response);
    }
}
