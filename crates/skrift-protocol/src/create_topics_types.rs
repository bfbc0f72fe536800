//! CreateTopics API types (v6).

use serde::{Deserialize, Serialize};
use skrift_common::{DecodeError, DecodeErrorKind, DecodeResult, ErrorContext};

use crate::headers::ResponseHeader;
use crate::parser::{Decoder, Encoder, KafkaDecodable, KafkaEncodable};

/// Explicit replica placement for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionAssignment {
    pub partition_index: i32,
    pub broker_ids: Vec<i32>,
}

/// A topic config entry in the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatableTopicConfig {
    pub name: String,
    pub value: Option<String>,
}

/// One topic to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatableTopic {
    pub name: String,
    pub num_partitions: i32,
    pub replication_factor: i16,
    pub assignments: Vec<PartitionAssignment>,
    pub configs: Vec<CreatableTopicConfig>,
}

impl CreatableTopic {
    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_compact_string(&self.name);
        encoder.write_i32(self.num_partitions);
        encoder.write_i16(self.replication_factor);

        encoder.write_compact_array_length(self.assignments.len());
        for assignment in &self.assignments {
            encoder.write_i32(assignment.partition_index);
            encoder.write_compact_int32_array(&assignment.broker_ids);
            encoder.write_empty_tag_buffer();
        }

        encoder.write_compact_array_length(self.configs.len());
        for config in &self.configs {
            encoder.write_compact_string(&config.name);
            encoder.write_compact_nullable_string(config.value.as_deref());
            encoder.write_empty_tag_buffer();
        }

        encoder.write_empty_tag_buffer();
    }

    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let name = decoder.read_compact_string().context("name")?;
        let num_partitions = decoder.read_i32().context("num_partitions")?;
        let replication_factor = decoder.read_i16().context("replication_factor")?;

        let assignment_count = decoder
            .read_compact_array_length()
            .context("assignments")?;
        let mut assignments = Vec::with_capacity(assignment_count);
        for i in 0..assignment_count {
            let context = format!("Assignments[{}]", i);
            let partition_index = decoder
                .read_i32()
                .context("partition_index")
                .context(&context)?;
            let broker_ids = decoder
                .read_compact_int32_array()
                .context("broker_ids")
                .context(&context)?;
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(&context)?;
            assignments.push(PartitionAssignment {
                partition_index,
                broker_ids,
            });
        }

        let config_count = decoder.read_compact_array_length().context("configs")?;
        let mut configs = Vec::with_capacity(config_count);
        for i in 0..config_count {
            let context = format!("Configs[{}]", i);
            let name = decoder
                .read_compact_string()
                .context("name")
                .context(&context)?;
            let value = decoder
                .read_compact_nullable_string()
                .context("value")
                .context(&context)?;
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(&context)?;
            configs.push(CreatableTopicConfig { name, value });
        }

        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(CreatableTopic {
            name,
            num_partitions,
            replication_factor,
            assignments,
            configs,
        })
    }
}

/// CreateTopics request body (v6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTopicsRequest {
    pub topics: Vec<CreatableTopic>,
    pub timeout_ms: i32,
    pub validate_only: bool,
}

impl KafkaEncodable for CreateTopicsRequest {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_compact_array_length(self.topics.len());
        for topic in &self.topics {
            topic.encode(encoder);
        }
        encoder.write_i32(self.timeout_ms);
        encoder.write_bool(self.validate_only);
        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for CreateTopicsRequest {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let count = decoder.read_compact_array_length().context("topics")?;
        let mut topics = Vec::with_capacity(count);
        for i in 0..count {
            topics.push(CreatableTopic::decode(decoder).context(format!("Topics[{}]", i))?);
        }

        let timeout_ms = decoder.read_i32().context("timeout_ms")?;
        let validate_only = decoder.read_bool().context("validate_only")?;
        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(CreateTopicsRequest {
            topics,
            timeout_ms,
            validate_only,
        })
    }
}

/// Config entry echoed in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatableTopicConfigResult {
    pub name: String,
    pub value: Option<String>,
    pub read_only: bool,
    pub config_source: i8,
    pub is_sensitive: bool,
}

/// Per-topic result in a CreateTopics response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatableTopicResult {
    pub name: String,
    pub error_code: i16,
    pub error_message: Option<String>,
    pub num_partitions: i32,
    pub replication_factor: i16,
    pub configs: Vec<CreatableTopicConfigResult>,
}

impl CreatableTopicResult {
    fn encode(&self, encoder: &mut Encoder<'_>) {
        encoder.write_compact_string(&self.name);
        encoder.write_i16(self.error_code);
        encoder.write_compact_nullable_string(self.error_message.as_deref());
        encoder.write_i32(self.num_partitions);
        encoder.write_i16(self.replication_factor);

        encoder.write_compact_array_length(self.configs.len());
        for config in &self.configs {
            encoder.write_compact_string(&config.name);
            encoder.write_compact_nullable_string(config.value.as_deref());
            encoder.write_bool(config.read_only);
            encoder.write_i8(config.config_source);
            encoder.write_bool(config.is_sensitive);
            encoder.write_empty_tag_buffer();
        }

        encoder.write_empty_tag_buffer();
    }

    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let name = decoder.read_compact_string().context("name")?;
        let error_code = decoder.read_i16().context("error_code")?;
        let error_message = decoder
            .read_compact_nullable_string()
            .context("error_message")?;
        let num_partitions = decoder.read_i32().context("num_partitions")?;
        let replication_factor = decoder.read_i16().context("replication_factor")?;

        let config_count = decoder.read_compact_array_length().context("configs")?;
        let mut configs = Vec::with_capacity(config_count);
        for i in 0..config_count {
            let context = format!("Configs[{}]", i);
            let name = decoder
                .read_compact_string()
                .context("name")
                .context(&context)?;
            let value = decoder
                .read_compact_nullable_string()
                .context("value")
                .context(&context)?;
            let read_only = decoder.read_bool().context("read_only").context(&context)?;
            let config_source = decoder
                .read_i8()
                .context("config_source")
                .context(&context)?;
            let is_sensitive = decoder
                .read_bool()
                .context("is_sensitive")
                .context(&context)?;
            decoder
                .consume_tag_buffer()
                .context("TAG_BUFFER")
                .context(&context)?;
            configs.push(CreatableTopicConfigResult {
                name,
                value,
                read_only,
                config_source,
                is_sensitive,
            });
        }

        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(CreatableTopicResult {
            name,
            error_code,
            error_message,
            num_partitions,
            replication_factor,
            configs,
        })
    }
}

/// CreateTopics response body (v6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTopicsResponse {
    pub throttle_time_ms: i32,
    pub topics: Vec<CreatableTopicResult>,
}

impl KafkaEncodable for CreateTopicsResponse {
    fn encode(&self, encoder: &mut Encoder<'_>, _version: i16) {
        encoder.write_i32(self.throttle_time_ms);
        encoder.write_compact_array_length(self.topics.len());
        for topic in &self.topics {
            topic.encode(encoder);
        }
        encoder.write_empty_tag_buffer();
    }
}

impl KafkaDecodable for CreateTopicsResponse {
    fn decode(decoder: &mut Decoder<'_>, _version: i16) -> DecodeResult<Self> {
        let throttle_time_ms = decoder.read_i32().context("throttle_time_ms")?;

        let count = decoder.read_compact_array_length().context("topics")?;
        let mut topics = Vec::with_capacity(count);
        for i in 0..count {
            topics.push(CreatableTopicResult::decode(decoder).context(format!("Topics[{}]", i))?);
        }

        decoder.consume_tag_buffer().context("TAG_BUFFER")?;

        Ok(CreateTopicsResponse {
            throttle_time_ms,
            topics,
        })
    }
}

/// Decode a full unframed CreateTopics response: header v1, body, and a
/// zero-remainder check.
pub fn decode_create_topics_response(
    bytes: &[u8],
    version: i16,
) -> DecodeResult<(ResponseHeader, CreateTopicsResponse)> {
    let mut decoder = Decoder::new(bytes);
    let result = (|| {
        let header = ResponseHeader::decode_v1(&mut decoder)?;
        let body = CreateTopicsResponse::decode(&mut decoder, version)?;
        if decoder.remaining() > 0 {
            return Err(DecodeError::new(
                DecodeErrorKind::TrailingBytes(decoder.remaining()),
                decoder.position(),
            ));
        }
        Ok((header, body))
    })();

    result.context(format!("CreateTopics Response v{}", version))
}
