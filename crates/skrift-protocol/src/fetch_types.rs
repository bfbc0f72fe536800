//! Fetch API types (v16).
//!
//! Topics are addressed by UUID at this version. The partition response
//! carries its record batches as a compact-bytes blob; the blob body is
//! a concatenation of zero or more complete batches and is decoded until
//! exactly the prefixed byte count has been consumed.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use skrift_common::{DecodeError, DecodeErrorKind, DecodeResult, ErrorContext, Uuid};

use crate::headers::ResponseHeader;
use crate::parser::{Decoder, Encoder, KafkaDecodable, KafkaEncodable};
use crate::records::{decode_batch_sequence, RecordBatch};

/// One partition slot in a fetch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPartition {
    pub partition: i32,
    pub current_leader_epoch: i32,
    pub fetch_offset: i64,
    pub last_fetched_offset: i32,
    pub log_start_offset: i64,
    pub partition_max_bytes: i32,
}

impl FetchPartition {
    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i32(self.partition);
        encoder.write_i32(self.current_leader_epoch);
        encoder.write_i64(self.fetch_offset);
        encoder.write_i32(self.last_fetched_offset);
        encoder.write_i64(self.log_start_offset);
        encoder.write_i32(self.partition_max_bytes);
        encoder.write_empty_tag_buffer();
    }

    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let partition = decoder.read_i32().context("partition")?;
        let current_leader_epoch = decoder.read_i32().context("current_leader_epoch")?;
        let fetch_offset = decoder.read_i64().context("fetch_offset")?;
        let last_fetched_offset = decoder.read_i32().context("last_fetched_offset")?;
        let log_start_offset = decoder.read_i64().context("log_start_offset")?;
        let partition_max_bytes = decoder.read_i32().context("partition_max_bytes")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(FetchPartition {
            partition,
            current_leader_epoch,
            fetch_offset,
            last_fetched_offset,
            log_start_offset,
            partition_max_bytes,
        })
    }
}

/// Topic block in a fetch request, keyed by topic UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTopic {
    pub topic_id: Uuid,
    pub partitions: Vec<FetchPartition>,
}

/// Topic dropped from an incremental fetch session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgottenTopic {
    pub topic_id: Uuid,
    pub partitions: Vec<i32>,
}

/// Fetch request body (v16).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub max_bytes: i32,
    pub isolation_level: i8,
    pub session_id: i32,
    pub session_epoch: i32,
    pub topics: Vec<FetchTopic>,
    pub forgotten_topics: Vec<ForgottenTopic>,
    pub rack_id: String,
}

impl KafkaEncodable for FetchRequest {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_i32(self.max_wait_ms);
        encoder.write_i32(self.min_bytes);
        encoder.write_i32(self.max_bytes);
        encoder.write_i8(self.isolation_level);
        encoder.write_i32(self.session_id);
        encoder.write_i32(self.session_epoch);

        encoder.write_compact_array_length(self.topics.len());
        for topic in &self.topics {
            encoder.write_uuid(topic.topic_id);
            encoder.write_compact_array_length(topic.partitions.len());
            for partition in &topic.partitions {
                partition.encode(encoder);
            }
            encoder.write_empty_tag_buffer();
        }

        encoder.write_compact_array_length(self.forgotten_topics.len());
        for forgotten in &self.forgotten_topics {
            encoder.write_uuid(forgotten.topic_id);
            encoder.write_compact_int32_array(&forgotten.partitions);
        }

        encoder.write_compact_string(&self.rack_id);
        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for FetchRequest {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let max_wait_ms = decoder.read_i32().context("max_wait_ms")?;
        let min_bytes = decoder.read_i32().context("min_bytes")?;
        let max_bytes = decoder.read_i32().context("max_bytes")?;
        let isolation_level = decoder.read_i8().context("isolation_level")?;
        let session_id = decoder.read_i32().context("session_id")?;
        let session_epoch = decoder.read_i32().context("session_epoch")?;

        let topic_count = decoder.read_compact_array_length().context("topics")?;
        let mut topics = Vec::with_capacity(topic_count);
        for i in 0..topic_count {
            let context = format!("Topics[{}]", i);
            let topic_id = decoder.read_uuid().context("topic_id").context(&context)?;

            let partition_count = decoder
                .read_compact_array_length()
                .context("partitions")
                .context(&context)?;
            let mut partitions = Vec::with_capacity(partition_count);
            for j in 0..partition_count {
                partitions.push(
                    FetchPartition::decode(decoder)
                        .context(format!("Partitions[{}]", j))
                        .context(&context)?,
                );
            }
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(&context)?;

            topics.push(FetchTopic {
                topic_id,
                partitions,
            });
        }

        let forgotten_count = decoder
            .read_compact_array_length()
            .context("forgotten_topics")?;
        let mut forgotten_topics = Vec::with_capacity(forgotten_count);
        for i in 0..forgotten_count {
            let context = format!("ForgottenTopics[{}]", i);
            let topic_id = decoder.read_uuid().context("topic_id").context(&context)?;
            let partitions = decoder
                .read_compact_int32_array()
                .context("partitions")
                .context(&context)?;
            forgotten_topics.push(ForgottenTopic {
                topic_id,
                partitions,
            });
        }

        let rack_id = decoder.read_compact_string().context("rack_id")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(FetchRequest {
            max_wait_ms,
            min_bytes,
            max_bytes,
            isolation_level,
            session_id,
            session_epoch,
            topics,
            forgotten_topics,
            rack_id,
        })
    }
}

/// Transaction marker inside a fetch partition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortedTransaction {
    pub producer_id: i64,
    pub first_offset: i64,
}

/// Per-partition data in a fetch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPartitionResponse {
    pub partition_index: i32,
    pub error_code: i16,
    pub high_watermark: i64,
    pub last_stable_offset: i64,
    pub log_start_offset: i64,
    pub aborted_transactions: Vec<AbortedTransaction>,
    pub preferred_read_replica: i32,
    pub record_batches: Vec<RecordBatch>,
}

impl FetchPartitionResponse {
    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_i32(self.partition_index);
        encoder.write_i16(self.error_code);
        encoder.write_i64(self.high_watermark);
        encoder.write_i64(self.last_stable_offset);
        encoder.write_i64(self.log_start_offset);

        encoder.write_compact_array_length(self.aborted_transactions.len());
        for txn in &self.aborted_transactions {
            encoder.write_i64(txn.producer_id);
            encoder.write_i64(txn.first_offset);
            encoder.write_empty_tag_buffer();
        }

        encoder.write_i32(self.preferred_read_replica);

        // Batches go through a scratch buffer so the compact-bytes
        // length prefix can be measured first.
        let mut scratch = BytesMut::new();
        let mut blob = Encoder::new(&mut scratch);
        for batch in &self.record_batches {
            batch.encode(&mut blob);
        }
        encoder.write_compact_bytes(Some(&scratch[..]));

        encoder.write_empty_tag_buffer();
    }

    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let partition_index = decoder.read_i32().context("partition_index")?;
        let error_code = decoder.read_i16().context("error_code")?;
        let high_watermark = decoder.read_i64().context("high_watermark")?;
        let last_stable_offset = decoder.read_i64().context("last_stable_offset")?;
        let log_start_offset = decoder.read_i64().context("log_start_offset")?;

        let txn_count = decoder
            .read_compact_array_length()
            .context("aborted_transactions")?;
        let mut aborted_transactions = Vec::with_capacity(txn_count);
        for i in 0..txn_count {
            let context = format!("AbortedTransactions[{}]", i);
            let producer_id = decoder
                .read_i64()
                .context("producer_id")
                .context(&context)?;
            let first_offset = decoder
                .read_i64()
                .context("first_offset")
                .context(&context)?;
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(&context)?;
            aborted_transactions.push(AbortedTransaction {
                producer_id,
                first_offset,
            });
        }

        let preferred_read_replica = decoder.read_i32().context("preferred_read_replica")?;

        // The records blob length is the compact-bytes prefix; decode
        // batches until exactly that many bytes have been consumed.
        let blob_len_offset = decoder.position();
        let blob_len = decoder
            .read_unsigned_varint()
            .context("record_batches")? as usize;
        let record_batches = if blob_len == 0 {
            Vec::new()
        } else {
            let blob_len = blob_len - 1;
            if blob_len > decoder.remaining() {
                return Err(DecodeError::new(
                    DecodeErrorKind::InvalidArrayLength,
                    blob_len_offset,
                )
                .context("record_batches"));
            }
            let end = decoder.position() + blob_len;
            decode_batch_sequence(decoder, end).context("record_batches")?
        };

        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(FetchPartitionResponse {
            partition_index,
            error_code,
            high_watermark,
            last_stable_offset,
            log_start_offset,
            aborted_transactions,
            preferred_read_replica,
            record_batches,
        })
    }
}

/// Per-topic data in a fetch response, keyed by topic UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTopicResponse {
    pub topic_id: Uuid,
    pub partitions: Vec<FetchPartitionResponse>,
}

/// Fetch response body (v16).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub throttle_time_ms: i32,
    pub error_code: i16,
    pub session_id: i32,
    pub responses: Vec<FetchTopicResponse>,
}

impl KafkaEncodable for FetchResponse {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_i32(self.throttle_time_ms);
        encoder.write_i16(self.error_code);
        encoder.write_i32(self.session_id);

        encoder.write_compact_array_length(self.responses.len());
        for topic in &self.responses {
            encoder.write_uuid(topic.topic_id);
            encoder.write_compact_array_length(topic.partitions.len());
            for partition in &topic.partitions {
                partition.encode(encoder);
            }
            encoder.write_empty_tag_buffer();
        }

        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for FetchResponse {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let throttle_time_ms = decoder.read_i32().context("throttle_time_ms")?;
        let error_code = decoder.read_i16().context("error_code")?;
        let session_id = decoder.read_i32().context("session_id")?;

        let topic_count = decoder.read_compact_array_length().context("responses")?;
        let mut responses = Vec::with_capacity(topic_count);
        for i in 0..topic_count {
            let context = format!("TopicResponse[{}]", i);
            let topic_id = decoder.read_uuid().context("topic_id").context(&context)?;

            let partition_count = decoder
                .read_compact_array_length()
                .context("partitions")
                .context(&context)?;
            let mut partitions = Vec::with_capacity(partition_count);
            for j in 0..partition_count {
                partitions.push(
                    FetchPartitionResponse::decode(decoder)
                        .context(format!("PartitionResponse[{}]", j))
                        .context(&context)?,
                );
            }
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(&context)?;

            responses.push(FetchTopicResponse {
                topic_id,
                partitions,
            });
        }

        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(FetchResponse {
            throttle_time_ms,
            error_code,
            session_id,
            responses,
        })
    }
}

/// Decode a full unframed Fetch response: header v1, body, and a
/// zero-remainder check.
pub fn decode_fetch_response(
    bytes: &[u8],
    version: i16,
) -> DecodeResult<(ResponseHeader, FetchResponse)> {
    let mut decoder = Decoder::new(bytes);
    let result = (|| {
        let header = ResponseHeader::decode_v1(&mut decoder)?;
        let body = FetchResponse::decode(&mut decoder, version)?;
        if decoder.remaining() > 0 {
            return Err(DecodeError::new(
                DecodeErrorKind::TrailingBytes(decoder.remaining()),
                decoder.position(),
            ));
        }
        Ok((header, body))
    })();

    result.context(format!("Fetch Response v{}", version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Record;
    use bytes::Bytes;

    fn topic_uuid() -> Uuid {
        Uuid::from_bytes([
            0x0f, 0x62, 0xa5, 0x8e, 0x61, 0x7b, 0x46, 0x2f, 0x91, 0x61, 0x13, 0x2a, 0x19, 0x46,
            0xd6, 0x6a,
        ])
    }

    fn sample_batch() -> RecordBatch {
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
                value: Some(Bytes::from_static(b"hi")),
                headers: vec![],
            }],
        }
    }

    #[test]
    fn test_request_round_trip() {
        let request = FetchRequest {
            max_wait_ms: 500,
            min_bytes: 1,
            max_bytes: 52428800,
            isolation_level: 0,
            session_id: 0,
            session_epoch: 0,
            topics: vec![FetchTopic {
                topic_id: topic_uuid(),
                partitions: vec![FetchPartition {
                    partition: 0,
                    current_leader_epoch: 0,
                    fetch_offset: 0,
                    last_fetched_offset: -1,
                    log_start_offset: -1,
                    partition_max_bytes: 1048576,
                }],
            }],
            forgotten_topics: vec![],
            rack_id: String::new(),
        };

        let mut buf = BytesMut::new();
        request.encode(&mut Encoder::new(&mut buf), 16);

        let mut decoder = Decoder::new(&buf);
        let decoded = FetchRequest::decode(&mut decoder, 16).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn test_response_round_trip_with_records() {
        let batches = vec![sample_batch()];
        let response = FetchResponse {
            throttle_time_ms: 0,
            error_code: 0,
            session_id: 0,
            responses: vec![FetchTopicResponse {
                topic_id: topic_uuid(),
                partitions: vec![FetchPartitionResponse {
                    partition_index: 0,
                    error_code: 0,
                    high_watermark: 1,
                    last_stable_offset: 1,
                    log_start_offset: 0,
                    aborted_transactions: vec![],
                    preferred_read_replica: -1,
                    record_batches: batches,
                }],
            }],
        };

        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        ResponseHeader::new(3).encode_v1(&mut encoder);
        response.encode(&mut encoder, 16);

        let (header, decoded) = decode_fetch_response(&buf, 16).unwrap();
        assert_eq!(header.correlation_id, 3);
        assert_eq!(decoded.responses[0].partitions[0].record_batches.len(), 1);
        assert_eq!(
            decoded.responses[0].partitions[0].record_batches[0].records[0].value,
            Some(Bytes::from_static(b"hi"))
        );
        // The batch_length and crc fields get filled in by the encoder,
        // so compare re-encoded bytes rather than struct equality.
        let mut reencoded = BytesMut::new();
        let mut re = Encoder::new(&mut reencoded);
        ResponseHeader::new(3).encode_v1(&mut re);
        decoded.encode(&mut re, 16);
        assert_eq!(&reencoded[..], &buf[..]);
    }

    #[test]
    fn test_response_with_empty_records_blob() {
        let response = FetchResponse {
            throttle_time_ms: 0,
            error_code: 0,
            session_id: 7,
            responses: vec![FetchTopicResponse {
                topic_id: topic_uuid(),
                partitions: vec![FetchPartitionResponse {
                    partition_index: 0,
                    error_code: crate::error_codes::UNKNOWN_TOPIC_ID,
                    high_watermark: 0,
                    last_stable_offset: 0,
                    log_start_offset: 0,
                    aborted_transactions: vec![],
                    preferred_read_replica: -1,
                    record_batches: vec![],
                }],
            }],
        };

        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        ResponseHeader::new(0).encode_v1(&mut encoder);
        response.encode(&mut encoder, 16);

        let (_, decoded) = decode_fetch_response(&buf, 16).unwrap();
        assert!(decoded.responses[0].partitions[0].record_batches.is_empty());
        assert_eq!(
            decoded.responses[0].partitions[0].error_code,
            crate::error_codes::UNKNOWN_TOPIC_ID
        );
    }

    #[test]
    fn test_corrupt_batch_reports_full_breadcrumb_chain() {
        let response = FetchResponse {
            throttle_time_ms: 0,
            error_code: 0,
            session_id: 0,
            responses: vec![FetchTopicResponse {
                topic_id: topic_uuid(),
                partitions: vec![FetchPartitionResponse {
                    partition_index: 0,
                    error_code: 0,
                    high_watermark: 1,
                    last_stable_offset: 1,
                    log_start_offset: 0,
                    aborted_transactions: vec![],
                    preferred_read_replica: -1,
                    record_batches: vec![sample_batch()],
                }],
            }],
        };

        let mut buf = BytesMut::new();
        let mut encoder = Encoder::new(&mut buf);
        ResponseHeader::new(0).encode_v1(&mut encoder);
        response.encode(&mut encoder, 16);

        // Flip the final batch byte (three tag buffers trail it) to
        // break the CRC.
        let mut bytes = buf.to_vec();
        let last = bytes.len() - 4;
        bytes[last] ^= 0xff;

        let err = decode_fetch_response(&bytes, 16).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::CrcMismatch { .. }));
        assert_eq!(
            err.context,
            vec![
                "crc",
                "RecordBatch[0]",
                "record_batches",
                "PartitionResponse[0]",
                "TopicResponse[0]",
                "Fetch Response v16"
            ]
        );
    }
}
